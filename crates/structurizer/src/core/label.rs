use tracing::trace;

use crate::{
    core::{
        block::BlockRegistry,
        construct::{Construct, ConstructId, ConstructKind},
    },
    error::Error,
    interfaces::{BlockId, Terminator},
};

/// Builds the construct tree while walking the block order with a stack of open constructs.
struct Labeler<'r, 'a> {
    registry: &'r mut BlockRegistry<'a>,
    order_len: usize,
    constructs: Vec<Construct>,
    enclosing: Vec<ConstructId>,
}

impl<'r, 'a> Labeler<'r, 'a> {
    fn top(&self) -> Result<ConstructId, Error> {
        self.enclosing
            .last()
            .copied()
            .ok_or_else(|| Error::Internal("construct stack is empty".to_string()))
    }

    fn close_ending_at(&mut self, id: BlockId) {
        while let Some(top) = self.enclosing.last() {
            if self.constructs[top.0].end_id != id {
                break;
            }
            self.enclosing.pop();
        }
    }

    fn push(
        &mut self,
        kind: ConstructKind,
        depth: usize,
        begin_id: BlockId,
        end_id: BlockId,
    ) -> Result<ConstructId, Error> {
        let begin_pos = self.registry.pos(begin_id)?;
        let end_pos = if end_id == 0 { self.order_len } else { self.registry.pos(end_id)? };

        let mut parent = self.enclosing.last().copied();
        let mut scope_end_pos = end_pos;

        // a loop is pushed right after its continue construct and becomes its sibling
        if kind == ConstructKind::Loop {
            let continue_construct = parent
                .map(|id| &self.constructs[id.0])
                .filter(|construct| construct.kind == ConstructKind::Continue)
                .ok_or_else(|| {
                    Error::Internal(format!(
                        "loop construct at block {begin_id} is not preceded by its continue construct"
                    ))
                })?;
            scope_end_pos = continue_construct.end_pos;
            parent = continue_construct.parent;
        }

        let id = ConstructId(self.constructs.len());
        let outer = parent.map(|p| &self.constructs[p.0]).filter(|p| p.depth < depth);
        let enclosing_loop = if kind == ConstructKind::Loop {
            Some(id)
        } else {
            outer.and_then(|p| p.enclosing_loop)
        };
        let enclosing_continue = if kind == ConstructKind::Continue {
            Some(id)
        } else {
            outer.and_then(|p| p.enclosing_continue)
        };
        let enclosing_breakable = match kind {
            ConstructKind::Loop | ConstructKind::Continue | ConstructKind::SwitchSelection => Some(id),
            _ => outer.and_then(|p| p.enclosing_breakable),
        };

        let construct = Construct {
            kind,
            parent,
            depth,
            begin_id,
            end_id,
            begin_pos,
            end_pos,
            scope_end_pos,
            enclosing_loop,
            enclosing_continue,
            enclosing_breakable,
        };
        trace!("opened construct {}: {construct}", id.0);

        self.constructs.push(construct);
        self.enclosing.push(id);
        Ok(id)
    }
}

/// Partitions the block order into nested constructs and records, for every ordered block, the
/// innermost construct containing it.
///
/// The first construct is always the function construct. A loop header opens its continue
/// construct and then, unless the loop is a single block, the loop construct itself. A loop
/// header whose conditional branch targets two distinct blocks of the loop body additionally
/// opens a synthetic if-selection spanning the body.
pub(crate) fn label_constructs(
    registry: &mut BlockRegistry<'_>,
    order: &[BlockId],
) -> Result<Vec<Construct>, Error> {
    let entry = order
        .first()
        .copied()
        .ok_or_else(|| Error::Internal("cannot label an empty block order".to_string()))?;

    let mut labeler =
        Labeler { registry, order_len: order.len(), constructs: Vec::new(), enclosing: Vec::new() };
    labeler.push(ConstructKind::Function, 0, entry, 0)?;

    for &id in order {
        labeler.close_ending_at(id);

        let info = labeler.registry.info(id)?;
        let (merge, ct) = (info.merge_for_header, info.continue_for_header);
        if merge != 0 {
            let outer = &labeler.constructs[labeler.top()?.0];
            let depth = outer.depth + 1;
            if labeler.registry.pos(merge)? > outer.end_pos {
                return Err(Error::StructuredExitViolation(format!(
                    "Merge block {merge} for header {id} lies outside the construct starting at block {} which ends at block {}",
                    outer.begin_id, outer.end_id
                )));
            }

            let terminator = &labeler.registry.block(id)?.terminator;
            if ct != 0 {
                labeler.push(ConstructKind::Continue, depth, ct, merge)?;
                if ct != id {
                    let loop_id = labeler.push(ConstructKind::Loop, depth, id, ct)?;

                    if let Terminator::BranchConditional { true_target, false_target, .. } =
                        terminator
                    {
                        let loop_construct = &labeler.constructs[loop_id.0];
                        if true_target != false_target &&
                            loop_construct.contains_pos(labeler.registry.pos(*true_target)?) &&
                            loop_construct.contains_pos(labeler.registry.pos(*false_target)?)
                        {
                            labeler.push(ConstructKind::IfSelection, depth + 1, id, ct)?;
                        }
                    }
                }
            } else {
                let kind = match terminator {
                    Terminator::BranchConditional { .. } => ConstructKind::IfSelection,
                    _ => ConstructKind::SwitchSelection,
                };
                labeler.push(kind, depth, id, merge)?;
            }
        }

        let top = labeler.top()?;
        labeler.registry.info_mut(id)?.construct = Some(top);
    }

    if labeler.enclosing.len() != 1 {
        return Err(Error::Internal(format!(
            "{} constructs were left open at the end of the block order",
            labeler.enclosing.len() - 1
        )));
    }

    Ok(labeler.constructs)
}
