use tracing::trace;

use crate::{
    core::{
        block::BlockRegistry,
        construct::{Construct, ConstructId, ConstructKind},
        edge::EdgeKind,
    },
    error::Error,
    interfaces::BlockId,
};

/// Read-only view used while classifying; the results are written back once every block has
/// been classified.
struct Classifier<'r, 'a> {
    registry: &'r BlockRegistry<'a>,
    constructs: &'r [Construct],
}

impl<'r, 'a> Classifier<'r, 'a> {
    fn construct(&self, id: ConstructId) -> &'r Construct {
        &self.constructs[id.0]
    }

    fn construct_of(&self, block: BlockId) -> Result<&'r Construct, Error> {
        self.registry
            .info(block)?
            .construct
            .map(|id| self.construct(id))
            .ok_or_else(|| Error::Internal(format!("block {block} was never assigned a construct")))
    }

    /// The header whose merge a `break` out of `breakable` would reach, with the kind of the
    /// breakable construct. The header of a continue construct is its loop header.
    fn breakable_header(
        &self,
        breakable: Option<ConstructId>,
    ) -> Result<Option<(BlockId, ConstructKind)>, Error> {
        let Some(construct) = breakable.map(|id| self.construct(id)) else {
            return Ok(None);
        };
        let header = match construct.kind {
            ConstructKind::Loop | ConstructKind::SwitchSelection => construct.begin_id,
            ConstructKind::Continue => self.registry.info(construct.begin_id)?.header_for_continue,
            _ => return Ok(None),
        };
        Ok(Some((header, construct.kind)))
    }

    fn back_edge(
        &self,
        src: BlockId,
        src_pos: usize,
        dest: BlockId,
        continue_construct: Option<&Construct>,
    ) -> Result<EdgeKind, Error> {
        let continue_construct = continue_construct.ok_or_else(|| {
            Error::IllegalBackedge(format!(
                "Invalid backedge ({src}->{dest}): {src} is not in a continue construct"
            ))
        })?;
        if src_pos + 1 != continue_construct.end_pos {
            return Err(Error::ContinueConstructViolation(format!(
                "Invalid exit ({src}->{dest}) from continue construct: {src} is not the last block in the continue construct starting at {} (violates post-dominance rule)",
                continue_construct.begin_id
            )));
        }
        let expected = self.registry.info(continue_construct.begin_id)?.header_for_continue;
        if expected != dest {
            return Err(Error::IllegalBackedge(format!(
                "Invalid backedge ({src}->{dest}): does not branch to the corresponding loop header, expected {expected}"
            )));
        }
        Ok(EdgeKind::Back)
    }

    fn forward_edge(
        &self,
        src: BlockId,
        src_pos: usize,
        src_construct: &Construct,
        dest: BlockId,
        dest_pos: usize,
    ) -> Result<EdgeKind, Error> {
        let registry = self.registry;

        if let Some(continue_construct) = src_construct.enclosing_continue.map(|id| self.construct(id))
        {
            if continue_construct.contains_pos(src_pos) &&
                !continue_construct.contains_pos(dest_pos) &&
                src_pos + 1 != continue_construct.end_pos
            {
                return Err(Error::ContinueConstructViolation(format!(
                    "Invalid exit ({src}->{dest}) from continue construct: {src} is not the last block in the continue construct starting at {} (violates post-dominance rule)",
                    continue_construct.begin_id
                )));
            }
        }

        let mut kind = EdgeKind::Forward;

        if let Some((header, breakable)) = self.breakable_header(src_construct.enclosing_breakable)? {
            if dest == registry.info(header)?.merge_for_header {
                kind = match breakable {
                    ConstructKind::SwitchSelection => EdgeKind::SwitchBreak,
                    _ => EdgeKind::LoopBreak,
                };
            }
        }

        if kind == EdgeKind::Forward {
            if let Some(loop_construct) = src_construct.enclosing_loop.map(|id| self.construct(id)) {
                if dest == registry.info(loop_construct.begin_id)?.continue_for_header {
                    kind = EdgeKind::LoopContinue;
                }
            }
        }

        if kind == EdgeKind::Forward && dest == registry.info(src_construct.begin_id)?.merge_for_header
        {
            kind = EdgeKind::IfBreak;
        }

        if kind != EdgeKind::Forward {
            return Ok(kind);
        }

        if dest_pos > src_construct.end_pos {
            let bypassed = match src_construct.kind {
                ConstructKind::Loop => {
                    let loop_merge = registry.info(src_construct.begin_id)?.merge_for_header;
                    if dest_pos < registry.pos(loop_merge)? {
                        ("continue target", src_construct.end_id)
                    } else {
                        ("merge block", loop_merge)
                    }
                }
                _ => ("merge block", src_construct.end_id),
            };
            return Err(Error::StructuredExitViolation(format!(
                "Branch from block {src} to block {dest} is an invalid exit from construct starting at block {}; branch bypasses {} {}",
                src_construct.begin_id, bypassed.0, bypassed.1
            )));
        }

        let dest_construct = self.construct_of(dest)?;
        if dest != dest_construct.begin_id && !dest_construct.contains_pos(src_pos) {
            let what = match dest_construct.kind {
                ConstructKind::Continue => "continue target",
                _ => "header",
            };
            return Err(Error::DominanceViolation(format!(
                "Branch from {src} to {dest} bypasses {what} {} (violates dominance rule)",
                dest_construct.begin_id
            )));
        }

        let dest_info = registry.info(dest)?;
        if let Some(switch) = dest_info.case_head_for.or(dest_info.default_head_for) {
            let switch_header = self.construct(switch).begin_id;
            if switch_header != src {
                return Err(Error::SwitchCaseViolation(format!(
                    "Branch from block {src} to block {dest} falls through into a case of the switch-selection headed at block {switch_header}"
                )));
            }
        }

        Ok(EdgeKind::Forward)
    }

    fn classify_block(&self, src: BlockId) -> Result<Vec<(BlockId, EdgeKind)>, Error> {
        let registry = self.registry;
        let src_pos = registry.pos(src)?;
        let src_construct = self.construct_of(src)?;
        let continue_construct = src_construct.enclosing_continue.map(|id| self.construct(id));
        let successors = registry.block(src)?.terminator.unique_successors();

        if successors.is_empty() {
            if let Some(continue_construct) = continue_construct {
                return Err(Error::ContinueConstructViolation(format!(
                    "Invalid function exit at block {src} from continue construct starting at {}",
                    continue_construct.begin_id
                )));
            }
        }

        let mut edges = Vec::with_capacity(successors.len());
        let mut backedges = 0;
        let mut forward = Vec::new();

        for dest in successors {
            let dest_pos = registry.pos(dest)?;
            let kind = if dest_pos <= src_pos {
                backedges += 1;
                self.back_edge(src, src_pos, dest, continue_construct)?
            } else {
                self.forward_edge(src, src_pos, src_construct, dest, dest_pos)?
            };
            trace!("edge {src}->{dest} is {kind}");

            if kind == EdgeKind::Forward {
                forward.push(dest);
            }
            edges.push((dest, kind));
        }

        if backedges > 1 {
            return Err(Error::IllegalBackedge(format!(
                "Block {src} has too many backedges: {backedges}"
            )));
        }
        if let [first, second, ..] = forward[..] {
            if !registry.info(src)?.is_header() {
                return Err(Error::MissingMerge(format!(
                    "Control flow diverges at block {src} (to {first}, {second}) but it is not a structured header (it has no merge instruction)"
                )));
            }
        }

        // the tail of a continue construct can only loop around or leave the loop
        if let Some(continue_construct) = continue_construct {
            if continue_construct.contains_pos(src_pos) && src_pos + 1 == continue_construct.end_pos
            {
                if let Some((dest, _)) = edges
                    .iter()
                    .find(|(_, kind)| !matches!(kind, EdgeKind::Back | EdgeKind::LoopBreak))
                {
                    return Err(Error::ContinueConstructViolation(format!(
                        "Invalid exit ({src}->{dest}) from continue construct starting at {}: its last block may only branch back to the loop header or to the loop merge",
                        continue_construct.begin_id
                    )));
                }
            }
        }

        Ok(edges)
    }
}

/// Assigns an [`EdgeKind`] to every distinct successor of every ordered block, rejecting edges
/// that leave a construct other than through its merge block or continue target.
pub(crate) fn classify_edges(
    registry: &mut BlockRegistry<'_>,
    order: &[BlockId],
    constructs: &[Construct],
) -> Result<(), Error> {
    let classifier = Classifier { registry: &*registry, constructs };
    let classified = order
        .iter()
        .map(|&src| classifier.classify_block(src).map(|edges| (src, edges)))
        .collect::<Result<Vec<_>, Error>>()?;

    for (src, edges) in classified {
        registry.info_mut(src)?.succ_edge = edges;
    }

    Ok(())
}
