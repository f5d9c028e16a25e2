use std::collections::BTreeSet;

use hashbrown::HashMap;
use tracing::trace;

use crate::{
    core::{
        block::BlockRegistry,
        construct::{Construct, ConstructId, ConstructKind},
    },
    error::Error,
    interfaces::{BlockId, CaseLiteral, CaseValue, Terminator},
};

/// Which way a switch reaches a clause head, used to word diagnostics.
#[derive(Clone, Copy)]
enum Target {
    Default,
    Case,
}

impl Target {
    fn noun(self) -> &'static str {
        match self {
            Target::Default => "default",
            Target::Case => "case",
        }
    }
}

/// Rejects a clause head lying at or before its switch header, past the switch's merge block,
/// or on another header's merge block.
fn check_clause_head(
    registry: &BlockRegistry<'_>,
    construct: &Construct,
    target: BlockId,
    which: Target,
) -> Result<(), Error> {
    let header = construct.begin_id;
    let info = registry.info(target)?;
    let pos = registry.pos(target)?;
    let noun = which.noun();

    if pos <= construct.begin_pos {
        return Err(Error::SwitchCaseViolation(format!(
            "Switch branch from block {header} to {noun} target block {target} can't be a back-edge"
        )));
    }
    if pos > construct.end_pos {
        return Err(Error::SwitchCaseViolation(format!(
            "Switch branch from block {header} to {noun} target block {target} escapes the selection construct"
        )));
    }
    if info.header_for_merge != 0 && info.header_for_merge != header {
        return Err(Error::DominanceViolation(format!(
            "Block {target} is the {noun} block for switch-selection header {header} and also the merge block for {} (violates dominance rule)",
            info.header_for_merge
        )));
    }
    Ok(())
}

/// Records, for every switch-selection construct, which blocks head its default and case
/// clauses and which case values select them.
pub(crate) fn find_switch_case_headers(
    registry: &mut BlockRegistry<'_>,
    constructs: &[Construct],
) -> Result<(), Error> {
    for (index, construct) in constructs.iter().enumerate() {
        if construct.kind != ConstructKind::SwitchSelection {
            continue;
        }
        let switch = ConstructId(index);
        let header = construct.begin_id;

        let Terminator::Switch { signedness, default, cases, .. } =
            &registry.block(header)?.terminator
        else {
            return Err(Error::Internal(format!(
                "switch-selection construct at block {header} does not end in a switch"
            )));
        };
        let default = *default;

        check_clause_head(registry, construct, default, Target::Default)?;
        let default_is_merge = default == construct.end_id;
        let default_info = registry.info_mut(default)?;
        if let Some(other) = default_info.default_head_for {
            return Err(Error::SwitchCaseViolation(format!(
                "Block {default} is declared as the default target for two switch instructions, at blocks {} and {header}",
                constructs[other.0].begin_id
            )));
        }
        default_info.default_is_merge = default_is_merge;
        if !default_is_merge {
            default_info.default_head_for = Some(switch);
        }
        trace!("block {default} is the default clause of switch {header}");

        let mut seen: BTreeSet<CaseLiteral> = BTreeSet::new();
        let mut targets: Vec<BlockId> = Vec::new();
        let mut values: HashMap<BlockId, BTreeSet<CaseValue>> = HashMap::new();
        for case in cases {
            let value = case.value.typed(*signedness);
            if !seen.insert(case.value) {
                return Err(Error::SwitchCaseViolation(format!(
                    "Duplicate case value {value} in switch in block {header}"
                )));
            }
            if !targets.contains(&case.target) {
                targets.push(case.target);
            }
            values.entry(case.target).or_default().insert(value);
        }

        for target in targets {
            check_clause_head(registry, construct, target, Target::Case)?;

            let info = registry.info_mut(target)?;
            if let Some(other) = info.case_head_for {
                return Err(Error::SwitchCaseViolation(format!(
                    "Block {target} is declared as the switch case target for two switch instructions, at blocks {} and {header}",
                    constructs[other.0].begin_id
                )));
            }
            info.case_values = values.remove(&target).unwrap_or_default();
            if target != construct.end_id {
                info.case_head_for = Some(switch);
            }
            trace!("block {target} is a case clause of switch {header}");
        }
    }

    Ok(())
}
