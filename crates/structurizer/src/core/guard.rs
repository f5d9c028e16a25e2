use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::{
    core::{block::BlockRegistry, edge::EdgeKind},
    error::Error,
    interfaces::BlockId,
};

/// The guard variables a function needs, keyed by the if-selection header owning each one.
///
/// A guard is needed when a block that is not itself a header both leaves an if-selection
/// through its merge and continues forward inside it: the early exit clears the guard and the
/// code following it inside the selection only runs while the guard is still set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuardPlan {
    guards: BTreeMap<BlockId, String>,
}

impl GuardPlan {
    /// The guard variable owned by the if-selection headed at `header`, if any.
    pub fn guard_for(&self, header: BlockId) -> Option<&str> {
        self.guards.get(&header).map(String::as_str)
    }

    /// All `(header, guard)` pairs, by increasing header id.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &str)> {
        self.guards.iter().map(|(header, name)| (*header, name.as_str()))
    }

    /// The number of guard variables.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Whether the function needs no guard variable at all.
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

/// Decides which if-selections need a guard variable. Guard names are `prefix` followed by the
/// header's block id.
pub(crate) fn plan_guards(
    registry: &BlockRegistry<'_>,
    order: &[BlockId],
    prefix: &str,
) -> Result<GuardPlan, Error> {
    let mut plan = GuardPlan::default();

    for &src in order {
        let info = registry.info(src)?;
        if info.is_header() {
            continue;
        }

        let normal = info
            .succ_edge
            .iter()
            .filter(|(_, kind)| matches!(kind, EdgeKind::Forward | EdgeKind::IfBreak))
            .count();
        if normal < 2 {
            continue;
        }

        for (dest, _) in info.succ_edge.iter().filter(|(_, kind)| *kind == EdgeKind::IfBreak) {
            let header = registry.info(*dest)?.header_for_merge;
            plan.guards.entry(header).or_insert_with(|| {
                trace!("block {src} needs guard for if-selection {header}");
                format!("{prefix}{header}")
            });
        }
    }

    Ok(plan)
}
