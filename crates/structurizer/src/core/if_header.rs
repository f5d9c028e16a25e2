use tracing::trace;

use crate::{
    core::{
        block::BlockRegistry,
        construct::{Construct, ConstructKind},
        edge::EdgeKind,
    },
    error::Error,
    interfaces::{BlockId, Terminator},
};

/// For every if-selection, records the heads of its then and else clauses and the premerge
/// block where both clauses rejoin before the selection's merge.
///
/// A clause head is only recorded when it lies inside the selection; an arm branching straight
/// to the merge (or out of the selection) has no clause.
pub(crate) fn find_if_selection_internal_headers(
    registry: &mut BlockRegistry<'_>,
    order: &[BlockId],
    constructs: &[Construct],
) -> Result<(), Error> {
    for construct in constructs {
        if construct.kind != ConstructKind::IfSelection {
            continue;
        }
        let header = construct.begin_id;

        let Terminator::BranchConditional { true_target, false_target, .. } =
            registry.block(header)?.terminator
        else {
            return Err(Error::Internal(format!(
                "if-selection construct at block {header} does not end in a conditional branch"
            )));
        };

        let true_pos = registry.pos(true_target)?;
        let false_pos = registry.pos(false_target)?;
        let contains_true = construct.contains_pos(true_pos);
        let contains_false = construct.contains_pos(false_pos);

        for (contained, head, arm) in
            [(contains_true, true_target, "true"), (contains_false, false_target, "false")]
        {
            if !contained {
                continue;
            }
            let other_header = registry.info(head)?.header_for_merge;
            if other_header != 0 && other_header != header {
                return Err(Error::DominanceViolation(format!(
                    "Block {head} is the {arm} branch for if-selection header {header} and also the merge block for header block {other_header} (violates dominance rule)"
                )));
            }
        }

        let mut premerge = 0;
        if contains_true && contains_false && true_pos != false_pos {
            // the first clause ends right before the second clause starts
            let end_first_clause = order
                .get(true_pos.max(false_pos) - 1)
                .copied()
                .ok_or_else(|| Error::Internal(format!("if-selection {header} has no first clause")))?;

            let mut if_break = 0;
            for &(dest, kind) in &registry.info(end_first_clause)?.succ_edge {
                match kind {
                    EdgeKind::IfBreak => if_break = dest,
                    EdgeKind::Forward if construct.contains_pos(registry.pos(dest)?) => {
                        if premerge != 0 {
                            return Err(Error::Internal(format!(
                                "clause ending at block {end_first_clause} has two forward edges within selection {header}, to {premerge} and {dest}"
                            )));
                        }
                        let merged_by = registry.info(dest)?.header_for_merge;
                        if merged_by != 0 {
                            return Err(Error::DominanceViolation(format!(
                                "Block {dest} is the merge block for {merged_by} but has alternate paths reaching it, starting from blocks {true_target} and {false_target} which are the true and false branches for the if-selection header block {header} (violates dominance rule)"
                            )));
                        }
                        premerge = dest;
                    }
                    _ => {}
                }
            }

            if if_break != 0 && premerge != 0 {
                return Err(Error::StructuredExitViolation(format!(
                    "Block {end_first_clause} in if-selection headed at block {header} branches to both the merge block {if_break} and also to block {premerge} later in the selection"
                )));
            }
        }

        let info = registry.info_mut(header)?;
        if contains_true {
            info.true_head = true_target;
        }
        if contains_false {
            info.false_head = false_target;
        }
        info.premerge_head = premerge;
        trace!(
            "if-selection {header}: true head {}, false head {}, premerge {premerge}",
            info.true_head,
            info.false_head
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            classify::classify_edges,
            label::label_constructs,
            merge::register_merges,
            order::{compute_block_order, verify_header_continue_merge_order},
            switch::find_switch_case_headers,
        },
        interfaces::{BasicBlock, Function},
    };

    fn find(function: &Function) -> Result<BlockRegistry<'_>, Error> {
        let mut registry = BlockRegistry::new(function)?;
        register_merges(&mut registry)?;
        let order = compute_block_order(&mut registry)?;
        verify_header_continue_merge_order(&registry, &order)?;
        let constructs = label_constructs(&mut registry, &order)?;
        find_switch_case_headers(&mut registry, &constructs)?;
        classify_edges(&mut registry, &order, &constructs)?;
        find_if_selection_internal_headers(&mut registry, &order, &constructs)?;
        Ok(registry)
    }

    fn heads(registry: &BlockRegistry<'_>, header: BlockId) -> Option<(BlockId, BlockId, BlockId)> {
        registry.get(header).map(|info| (info.true_head, info.false_head, info.premerge_head))
    }

    #[test]
    fn test_arm_to_merge_has_no_head() {
        let function = Function::new(
            "test",
            vec![
                BasicBlock::new(10, Terminator::conditional(1, 20, 99)).with_selection_merge(99),
                BasicBlock::new(20, Terminator::branch(99)),
                BasicBlock::new(99, Terminator::Return),
            ],
        );
        let registry = find(&function).expect("failed to find if heads");
        assert_eq!(heads(&registry, 10), Some((20, 0, 0)));
    }

    #[test]
    fn test_finds_premerge() {
        let function = Function::new(
            "test",
            vec![
                BasicBlock::new(10, Terminator::conditional(1, 20, 30)).with_selection_merge(99),
                BasicBlock::new(20, Terminator::branch(80)),
                BasicBlock::new(30, Terminator::branch(80)),
                BasicBlock::new(80, Terminator::branch(99)),
                BasicBlock::new(99, Terminator::Return),
            ],
        );
        let registry = find(&function).expect("failed to find if heads");
        assert_eq!(heads(&registry, 10), Some((20, 30, 80)));
    }

    #[test]
    fn test_else_head_can_be_premerge() {
        let function = Function::new(
            "test",
            vec![
                BasicBlock::new(10, Terminator::conditional(1, 20, 30)).with_selection_merge(99),
                BasicBlock::new(20, Terminator::branch(30)),
                BasicBlock::new(30, Terminator::branch(99)),
                BasicBlock::new(99, Terminator::Return),
            ],
        );
        let registry = find(&function).expect("failed to find if heads");
        assert_eq!(heads(&registry, 10), Some((20, 30, 30)));
    }

    #[test]
    fn test_rejects_true_head_that_is_an_inner_merge() {
        let function = Function::new(
            "test",
            vec![
                BasicBlock::new(10, Terminator::conditional(1, 20, 30)).with_selection_merge(99),
                BasicBlock::new(30, Terminator::conditional(2, 20, 40)).with_selection_merge(20),
                BasicBlock::new(40, Terminator::branch(20)),
                BasicBlock::new(20, Terminator::branch(99)),
                BasicBlock::new(99, Terminator::Return),
            ],
        );
        let err = find(&function).map(|_| ()).expect_err("accepted a head on an inner merge");
        assert!(matches!(err, Error::DominanceViolation(_)));
        assert_eq!(
            err.to_string(),
            "Block 20 is the true branch for if-selection header 10 and also the merge block for header block 30 (violates dominance rule)"
        );
    }

    #[test]
    fn test_rejects_premerge_that_is_an_inner_merge() {
        let function = Function::new(
            "test",
            vec![
                BasicBlock::new(10, Terminator::conditional(1, 20, 30)).with_selection_merge(99),
                BasicBlock::new(20, Terminator::branch(50)),
                BasicBlock::new(30, Terminator::conditional(2, 40, 50)).with_selection_merge(50),
                BasicBlock::new(40, Terminator::branch(50)),
                BasicBlock::new(50, Terminator::branch(99)),
                BasicBlock::new(99, Terminator::Return),
            ],
        );
        let err = find(&function).map(|_| ()).expect_err("accepted a premerge on an inner merge");
        assert!(matches!(err, Error::DominanceViolation(_)));
        assert!(err.to_string().starts_with("Block 50 is the merge block for 30"));
    }

    #[test]
    fn test_rejects_if_break_next_to_premerge() {
        let function = Function::new(
            "test",
            vec![
                BasicBlock::new(10, Terminator::conditional(1, 20, 30)).with_selection_merge(99),
                BasicBlock::new(20, Terminator::conditional(2, 99, 40)),
                BasicBlock::new(30, Terminator::branch(40)),
                BasicBlock::new(40, Terminator::branch(99)),
                BasicBlock::new(99, Terminator::Return),
            ],
        );
        let err = find(&function).map(|_| ()).expect_err("accepted an if-break beside a premerge");
        assert!(matches!(err, Error::StructuredExitViolation(_)));
        assert_eq!(
            err.to_string(),
            "Block 20 in if-selection headed at block 10 branches to both the merge block 99 and also to block 40 later in the selection"
        );
    }
}
