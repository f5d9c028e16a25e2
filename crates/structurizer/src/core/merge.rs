use tracing::trace;

use crate::{
    core::block::BlockRegistry,
    error::Error,
    interfaces::{HeaderAnnotation, Terminator},
};

/// Records the header/merge and header/continue-target relationships declared by every block's
/// [`HeaderAnnotation`], validating each declaration.
pub(crate) fn register_merges(registry: &mut BlockRegistry<'_>) -> Result<(), Error> {
    let function = registry.function();
    let entry_id = registry.entry_id();

    for block in &function.blocks {
        let header = block.id;

        if let Some(annotation) = &block.merge {
            match (annotation, &block.terminator) {
                (
                    HeaderAnnotation::SelectionMerge { .. },
                    Terminator::BranchConditional { .. } | Terminator::Switch { .. },
                ) |
                (
                    HeaderAnnotation::LoopMerge { .. },
                    Terminator::Branch { .. } | Terminator::BranchConditional { .. },
                ) => {}
                (HeaderAnnotation::SelectionMerge { .. }, _) => {
                    return Err(Error::MalformedMerge(format!(
                        "Selection header {header} does not end in a conditional branch or switch"
                    )));
                }
                (HeaderAnnotation::LoopMerge { .. }, _) => {
                    return Err(Error::MalformedMerge(format!(
                        "Loop header {header} does not end in a branch or conditional branch"
                    )));
                }
            }

            let merge = annotation.merge();
            let merge_info = registry.get(merge).ok_or_else(|| {
                Error::MalformedMerge(format!(
                    "Structured header block {header} declares invalid merge block {merge}"
                ))
            })?;
            if merge == header {
                return Err(Error::MalformedMerge(format!(
                    "Structured header block {header} cannot be its own merge block"
                )));
            }
            if merge_info.header_for_merge != 0 {
                return Err(Error::MalformedMerge(format!(
                    "Block {merge} declared as merge block for more than one header: {}, {header}",
                    merge_info.header_for_merge
                )));
            }
            registry.info_mut(merge)?.header_for_merge = header;
            registry.info_mut(header)?.merge_for_header = merge;
            trace!("block {header} merges at {merge}");

            if let Some(ct) = annotation.continue_target() {
                if header == entry_id {
                    return Err(Error::MalformedMerge(format!(
                        "Function entry block {header} cannot be a loop header"
                    )));
                }
                let ct_info = registry.get(ct).ok_or_else(|| {
                    Error::MalformedMerge(format!(
                        "Structured header {header} declares invalid continue target {ct}"
                    ))
                })?;
                if ct == merge {
                    return Err(Error::MalformedMerge(format!(
                        "Invalid structured header block {header}: declares block {ct} as both its merge block and continue target"
                    )));
                }
                if ct_info.header_for_continue != 0 {
                    return Err(Error::MalformedMerge(format!(
                        "Block {ct} declared as continue target for more than one header: {}, {header}",
                        ct_info.header_for_continue
                    )));
                }
                registry.info_mut(ct)?.header_for_continue = header;
                registry.info_mut(header)?.continue_for_header = ct;
                trace!("loop {header} continues at {ct}");
            }
        } else if matches!(block.terminator, Terminator::Switch { .. }) {
            return Err(Error::MissingMerge(format!(
                "Switch in block {header} is not preceded by a selection merge"
            )));
        }

        let info = registry.info_mut(header)?;
        info.is_continue_entire_loop = info.continue_for_header == header;
        let branches_to_self = block.terminator.successors().contains(&header);
        if branches_to_self && !info.is_continue_entire_loop {
            return Err(Error::IllegalBackedge(format!(
                "Block {header} branches to itself but is not its own continue target"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{BasicBlock, Function};

    fn register(blocks: Vec<BasicBlock>) -> Result<(), Error> {
        let function = Function::new("test", blocks);
        let mut registry = BlockRegistry::new(&function)?;
        register_merges(&mut registry)
    }

    #[test]
    fn test_records_selection_and_loop_relationships() {
        let function = Function::new(
            "test",
            vec![
                BasicBlock::new(10, Terminator::branch(20)),
                BasicBlock::new(20, Terminator::branch(30)).with_loop_merge(99, 40),
                BasicBlock::new(30, Terminator::conditional(1, 35, 38)).with_selection_merge(38),
                BasicBlock::new(35, Terminator::branch(38)),
                BasicBlock::new(38, Terminator::branch(40)),
                BasicBlock::new(40, Terminator::conditional(2, 20, 99)),
                BasicBlock::new(99, Terminator::Return),
            ],
        );
        let mut registry = BlockRegistry::new(&function).expect("failed to register blocks");
        register_merges(&mut registry).expect("failed to register merges");

        let header = registry.get(20).expect("missing block 20");
        assert_eq!(header.merge_for_header, 99);
        assert_eq!(header.continue_for_header, 40);
        assert!(!header.is_continue_entire_loop);
        assert_eq!(registry.get(99).map(|info| info.header_for_merge), Some(20));
        assert_eq!(registry.get(40).map(|info| info.header_for_continue), Some(20));
        assert_eq!(registry.get(30).map(|info| info.merge_for_header), Some(38));
        assert_eq!(registry.get(38).map(|info| info.header_for_merge), Some(30));
    }

    #[test]
    fn test_single_block_loop_is_entire_loop() {
        let function = Function::new(
            "test",
            vec![
                BasicBlock::new(10, Terminator::branch(20)),
                BasicBlock::new(20, Terminator::conditional(1, 20, 99)).with_loop_merge(99, 20),
                BasicBlock::new(99, Terminator::Return),
            ],
        );
        let mut registry = BlockRegistry::new(&function).expect("failed to register blocks");
        register_merges(&mut registry).expect("failed to register merges");

        assert_eq!(registry.get(20).map(|info| info.is_continue_entire_loop), Some(true));
    }

    #[test]
    fn test_rejects_own_merge() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::branch(20)),
            BasicBlock::new(20, Terminator::conditional(1, 30, 99)).with_selection_merge(20),
            BasicBlock::new(30, Terminator::branch(99)),
            BasicBlock::new(99, Terminator::Return),
        ])
        .expect_err("accepted a self merge");
        assert!(matches!(err, Error::MalformedMerge(_)));
        assert_eq!(err.to_string(), "Structured header block 20 cannot be its own merge block");
    }

    #[test]
    fn test_rejects_merge_shared_by_two_headers() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::conditional(1, 20, 99)).with_selection_merge(99),
            BasicBlock::new(20, Terminator::conditional(2, 30, 99)).with_selection_merge(99),
            BasicBlock::new(30, Terminator::branch(99)),
            BasicBlock::new(99, Terminator::Return),
        ])
        .expect_err("accepted a shared merge");
        assert!(matches!(err, Error::MalformedMerge(_)));
        assert_eq!(
            err.to_string(),
            "Block 99 declared as merge block for more than one header: 10, 20"
        );
    }

    #[test]
    fn test_rejects_continue_equal_to_merge() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::branch(20)),
            BasicBlock::new(20, Terminator::branch(99)).with_loop_merge(99, 99),
            BasicBlock::new(99, Terminator::Return),
        ])
        .expect_err("accepted continue == merge");
        assert!(matches!(err, Error::MalformedMerge(_)));
        assert!(err.to_string().contains("as both its merge block and continue target"));
    }

    #[test]
    fn test_rejects_shared_continue_target() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::branch(20)),
            BasicBlock::new(20, Terminator::branch(30)).with_loop_merge(99, 50),
            BasicBlock::new(30, Terminator::branch(50)).with_loop_merge(40, 50),
            BasicBlock::new(40, Terminator::branch(99)),
            BasicBlock::new(50, Terminator::branch(20)),
            BasicBlock::new(99, Terminator::Return),
        ])
        .expect_err("accepted a shared continue target");
        assert_eq!(
            err.to_string(),
            "Block 50 declared as continue target for more than one header: 20, 30"
        );
    }

    #[test]
    fn test_rejects_entry_loop_header() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::branch(20)).with_loop_merge(99, 20),
            BasicBlock::new(20, Terminator::branch(99)),
            BasicBlock::new(99, Terminator::Return),
        ])
        .expect_err("accepted an entry loop header");
        assert_eq!(err.to_string(), "Function entry block 10 cannot be a loop header");
    }

    #[test]
    fn test_rejects_unknown_merge_block() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::conditional(1, 20, 20)).with_selection_merge(77),
            BasicBlock::new(20, Terminator::Return),
        ])
        .expect_err("accepted an unknown merge");
        assert_eq!(err.to_string(), "Structured header block 10 declares invalid merge block 77");
    }

    #[test]
    fn test_rejects_header_with_wrong_terminator() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::Return).with_selection_merge(20),
            BasicBlock::new(20, Terminator::Return),
        ])
        .expect_err("accepted a returning selection header");
        assert!(matches!(err, Error::MalformedMerge(_)));

        let err = register(vec![
            BasicBlock::new(10, Terminator::branch(20)),
            BasicBlock::new(20, Terminator::switch(1, 30, [(1, 99)]))
                .with_loop_merge(99, 30),
            BasicBlock::new(30, Terminator::branch(20)),
            BasicBlock::new(99, Terminator::Return),
        ])
        .expect_err("accepted a switching loop header");
        assert_eq!(err.to_string(), "Loop header 20 does not end in a branch or conditional branch");
    }

    #[test]
    fn test_rejects_switch_without_merge() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::switch(1, 20, [(1, 30)])),
            BasicBlock::new(20, Terminator::Return),
            BasicBlock::new(30, Terminator::Return),
        ])
        .expect_err("accepted a switch without merge");
        assert!(matches!(err, Error::MissingMerge(_)));
    }

    #[test]
    fn test_rejects_self_branch_without_continue() {
        let err = register(vec![
            BasicBlock::new(10, Terminator::branch(20)),
            BasicBlock::new(20, Terminator::conditional(1, 20, 99)),
            BasicBlock::new(99, Terminator::Return),
        ])
        .expect_err("accepted a self loop without a loop merge");
        assert!(matches!(err, Error::IllegalBackedge(_)));
        assert_eq!(err.to_string(), "Block 20 branches to itself but is not its own continue target");
    }
}
