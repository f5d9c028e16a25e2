use hashbrown::HashSet;
use petgraph::{algo::dominators::simple_fast, graphmap::DiGraphMap};
use tracing::trace;

use crate::{
    core::block::BlockRegistry,
    error::Error,
    interfaces::{BlockId, Function, Terminator},
};

/// A pending node of the depth-first traversal.
struct Frame {
    block: BlockId,
    children: Vec<BlockId>,
    next: usize,
}

/// Builds the plain control-flow graph of `function`, one node per block and one edge per
/// distinct branch target.
pub(crate) fn flow_graph(function: &Function) -> DiGraphMap<BlockId, ()> {
    let mut graph = DiGraphMap::new();
    for block in &function.blocks {
        graph.add_node(block.id);
        for succ in block.terminator.unique_successors() {
            graph.add_edge(block.id, succ, ());
        }
    }
    graph
}

/// Branch targets in the order the traversal should visit them. They are visited in reverse
/// so that, once the post-order is reversed, true targets precede false targets and the switch
/// default precedes the cases.
fn reverse_successors(terminator: &Terminator) -> Vec<BlockId> {
    match terminator {
        Terminator::Branch { target } => vec![*target],
        Terminator::BranchConditional { true_target, false_target, .. } => {
            vec![*false_target, *true_target]
        }
        Terminator::Switch { default, cases, .. } => {
            cases.iter().rev().map(|case| case.target).chain(std::iter::once(*default)).collect()
        }
        Terminator::Return |
        Terminator::ReturnValue { .. } |
        Terminator::Kill |
        Terminator::Unreachable => Vec::new(),
    }
}

/// Children of `id` in the structured traversal: its merge block, then its continue target,
/// then its branch targets.
fn structured_successors(registry: &BlockRegistry<'_>, id: BlockId) -> Result<Vec<BlockId>, Error> {
    let info = registry.info(id)?;
    let mut children = Vec::new();
    if info.merge_for_header != 0 {
        children.push(info.merge_for_header);
        if info.continue_for_header != 0 {
            children.push(info.continue_for_header);
        }
    }
    children.extend(reverse_successors(&registry.block(id)?.terminator));
    Ok(children)
}

/// Computes the structured block order: the reverse post-order of a depth-first traversal that
/// visits a header's merge block and continue target before its branch targets. Merge blocks
/// therefore come after every block of their construct, and continue constructs after their
/// loop bodies.
///
/// Blocks reached neither by a branch nor as the merge or continue target of a reached header
/// are left out. Every ordered block gets its `pos`.
pub(crate) fn compute_block_order(registry: &mut BlockRegistry<'_>) -> Result<Vec<BlockId>, Error> {
    let entry = registry.entry_id();
    let mut visited = HashSet::with_capacity(registry.len());
    let mut post_order = Vec::with_capacity(registry.len());

    visited.insert(entry);
    let mut stack =
        vec![Frame { block: entry, children: structured_successors(registry, entry)?, next: 0 }];

    while let Some(frame) = stack.last_mut() {
        match frame.children.get(frame.next).copied() {
            Some(child) => {
                frame.next += 1;
                if visited.insert(child) {
                    let children = structured_successors(registry, child)?;
                    stack.push(Frame { block: child, children, next: 0 });
                }
            }
            None => {
                post_order.push(frame.block);
                stack.pop();
            }
        }
    }

    post_order.reverse();
    for (pos, id) in post_order.iter().enumerate() {
        registry.info_mut(*id)?.pos = Some(pos);
        trace!("block {id} is at position {pos}");
    }

    Ok(post_order)
}

/// Checks the dominance relations the construct labeling relies on:
///
/// - a header strictly precedes its merge block,
/// - a loop header precedes and dominates its continue target,
/// - a loop's merge block comes after its continue construct starts.
pub(crate) fn verify_header_continue_merge_order(
    registry: &BlockRegistry<'_>,
    order: &[BlockId],
) -> Result<(), Error> {
    let graph = flow_graph(registry.function());
    let dominators = simple_fast(&graph, registry.entry_id());

    for &header in order {
        let info = registry.info(header)?;
        let merge = info.merge_for_header;
        if merge == 0 {
            continue;
        }

        let header_pos = registry.pos(header)?;
        let merge_pos = registry.pos(merge)?;
        if merge_pos <= header_pos {
            return Err(Error::MalformedMerge(format!(
                "Header {header} does not strictly dominate its merge block {merge}"
            )));
        }

        let ct = info.continue_for_header;
        if ct == 0 {
            continue;
        }

        let ct_pos = registry.pos(ct)?;
        let dominated = match dominators.dominators(ct) {
            Some(mut doms) => doms.any(|dom| dom == header),
            // an unreachable continue target is only ordered through its header
            None => true,
        };
        if ct_pos < header_pos || !dominated {
            return Err(Error::MalformedMerge(format!(
                "Loop header {header} does not dominate its continue target {ct}"
            )));
        }
        if merge_pos <= ct_pos {
            return Err(Error::MalformedMerge(format!(
                "Merge block {merge} for loop headed at block {header} appears at or before the loop's continue construct headed by block {ct}"
            )));
        }
    }

    Ok(())
}
