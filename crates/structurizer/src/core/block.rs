use std::collections::BTreeSet;

use hashbrown::{HashMap, HashSet};

use crate::{
    core::{construct::ConstructId, edge::EdgeKind},
    error::Error,
    interfaces::{BasicBlock, BlockId, CaseValue, Function},
};

/// Everything the pipeline learns about one basic block. Each field is written by exactly one
/// phase and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// The block's id
    pub id: BlockId,
    /// Index of the block inside [`Function::blocks`]
    pub(crate) index: usize,

    /// Position in the structured block order. `None` for unreachable blocks.
    pub pos: Option<usize>,

    /// The merge block declared by this header, or 0
    pub merge_for_header: BlockId,
    /// The header declaring this block as its merge, or 0
    pub header_for_merge: BlockId,
    /// The continue target declared by this loop header, or 0
    pub continue_for_header: BlockId,
    /// The loop header declaring this block as its continue target, or 0
    pub header_for_continue: BlockId,
    /// Whether this block is a loop header that is also its own continue target
    pub is_continue_entire_loop: bool,

    /// The switch construct this block is a case target for
    pub case_head_for: Option<ConstructId>,
    /// The switch construct this block is the default target for
    pub default_head_for: Option<ConstructId>,
    /// Whether this block is a switch default target that is also the switch's merge
    pub default_is_merge: bool,
    /// The case values branching to this block
    pub case_values: BTreeSet<CaseValue>,

    /// For if-selection headers: the first block of the then-clause, or 0
    pub true_head: BlockId,
    /// For if-selection headers: the first block of the else-clause, or 0
    pub false_head: BlockId,
    /// For if-selection headers: where both clauses reconverge before the merge, or 0
    pub premerge_head: BlockId,

    /// The classified outgoing edges, in successor order
    pub succ_edge: Vec<(BlockId, EdgeKind)>,

    /// The innermost construct containing this block
    pub construct: Option<ConstructId>,
}

impl BlockInfo {
    fn new(id: BlockId, index: usize) -> Self {
        Self {
            id,
            index,
            pos: None,
            merge_for_header: 0,
            header_for_merge: 0,
            continue_for_header: 0,
            header_for_continue: 0,
            is_continue_entire_loop: false,
            case_head_for: None,
            default_head_for: None,
            default_is_merge: false,
            case_values: BTreeSet::new(),
            true_head: 0,
            false_head: 0,
            premerge_head: 0,
            succ_edge: Vec::new(),
            construct: None,
        }
    }

    /// The classification of the edge to `dest`, if this block branches there.
    pub fn edge_kind(&self, dest: BlockId) -> Option<EdgeKind> {
        self.succ_edge.iter().find(|(target, _)| *target == dest).map(|(_, kind)| *kind)
    }

    /// Whether this block declares a merge, i.e. heads a selection or a loop.
    pub fn is_header(&self) -> bool {
        self.merge_for_header != 0
    }
}

/// Per-function table from block id to [`BlockInfo`].
#[derive(Debug, Clone)]
pub struct BlockRegistry<'a> {
    function: &'a Function,
    infos: HashMap<BlockId, BlockInfo>,
}

impl<'a> BlockRegistry<'a> {
    /// Registers every block of `function` and checks that each terminator only targets blocks of
    /// the function other than its entry.
    pub fn new(function: &'a Function) -> Result<Self, Error> {
        let entry = function.entry().ok_or_else(|| {
            Error::InvalidInput(format!("function '{}' has no blocks", function.name))
        })?;

        let mut infos = HashMap::with_capacity(function.blocks.len());
        for (index, block) in function.blocks.iter().enumerate() {
            if block.id == 0 {
                return Err(Error::InvalidInput(format!(
                    "block {index} of function '{}' uses the reserved id 0",
                    function.name
                )));
            }
            if infos.insert(block.id, BlockInfo::new(block.id, index)).is_some() {
                return Err(Error::InvalidInput(format!(
                    "block {} is defined more than once in function '{}'",
                    block.id, function.name
                )));
            }
        }

        let ids: HashSet<BlockId> = infos.keys().copied().collect();
        for block in &function.blocks {
            for succ in block.terminator.successors() {
                if succ == entry.id {
                    return Err(Error::IllegalBackedge(format!(
                        "Block {} branches to function entry block {}",
                        block.id, entry.id
                    )));
                }
                if !ids.contains(&succ) {
                    return Err(Error::InvalidInput(format!(
                        "Block {} in function '{}' branches to {} which is not a block in the function",
                        block.id, function.name, succ
                    )));
                }
            }
        }

        Ok(Self { function, infos })
    }

    /// The function this registry describes.
    pub fn function(&self) -> &'a Function {
        self.function
    }

    /// The id of the entry block.
    pub fn entry_id(&self) -> BlockId {
        self.function.blocks.first().map(|block| block.id).unwrap_or_default()
    }

    /// Looks up the info of a block.
    pub fn get(&self, id: BlockId) -> Option<&BlockInfo> {
        self.infos.get(&id)
    }

    /// The number of registered blocks.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether the registry holds no blocks. Never true for a registry built by [`Self::new`].
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub(crate) fn info(&self, id: BlockId) -> Result<&BlockInfo, Error> {
        self.infos.get(&id).ok_or_else(|| Error::Internal(format!("block {id} is not registered")))
    }

    pub(crate) fn info_mut(&mut self, id: BlockId) -> Result<&mut BlockInfo, Error> {
        self.infos.get_mut(&id).ok_or_else(|| Error::Internal(format!("block {id} is not registered")))
    }

    pub(crate) fn block(&self, id: BlockId) -> Result<&'a BasicBlock, Error> {
        let index = self.info(id)?.index;
        self.function
            .blocks
            .get(index)
            .ok_or_else(|| Error::Internal(format!("block {id} has no basic block")))
    }

    pub(crate) fn pos(&self, id: BlockId) -> Result<usize, Error> {
        self.info(id)?
            .pos
            .ok_or_else(|| Error::Internal(format!("block {id} has no position in the block order")))
    }

    pub(crate) fn edge_kind(&self, src: BlockId, dest: BlockId) -> Result<EdgeKind, Error> {
        self.info(src)?
            .edge_kind(dest)
            .ok_or_else(|| Error::Internal(format!("edge {src}->{dest} was never classified")))
    }
}
