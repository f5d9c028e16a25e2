use std::fmt::{self, Display};

use serde::Serialize;

use crate::interfaces::BlockId;

/// Index of a [`Construct`] inside its function's construct list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConstructId(pub(crate) usize);

impl ConstructId {
    /// The index into the construct list.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The kind of structured region a [`Construct`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    /// The whole function body
    Function,
    /// A two-way selection
    IfSelection,
    /// A multi-way selection
    SwitchSelection,
    /// A loop body, excluding its continue construct
    Loop,
    /// A loop's continue construct (the entire loop for single-block loops)
    Continue,
}

impl Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructKind::Function => write!(f, "Function"),
            ConstructKind::IfSelection => write!(f, "IfSelection"),
            ConstructKind::SwitchSelection => write!(f, "SwitchSelection"),
            ConstructKind::Loop => write!(f, "Loop"),
            ConstructKind::Continue => write!(f, "Continue"),
        }
    }
}

/// A node of the construct tree: a half-open range `[begin_pos, end_pos)` of the block order.
///
/// A loop whose continue target differs from its header is split into two sibling constructs,
/// the [`ConstructKind::Loop`] and the [`ConstructKind::Continue`], which share a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Construct {
    /// The construct kind
    pub kind: ConstructKind,
    /// The enclosing construct. `None` only for the function construct.
    pub parent: Option<ConstructId>,
    /// Nesting depth, 0 for the function construct
    pub depth: usize,
    /// The first block of the construct
    pub begin_id: BlockId,
    /// The block ending the construct, or 0 for the function construct
    pub end_id: BlockId,
    /// Position of `begin_id` in the block order
    pub begin_pos: usize,
    /// Position of `end_id` in the block order, or the order length
    pub end_pos: usize,
    /// For a loop, the end of its continue construct. Otherwise equal to `end_pos`.
    pub scope_end_pos: usize,
    /// The innermost loop construct containing this one, or itself
    pub enclosing_loop: Option<ConstructId>,
    /// The innermost continue construct containing this one, or itself
    pub enclosing_continue: Option<ConstructId>,
    /// The innermost loop, continue or switch construct containing this one, or itself
    pub enclosing_breakable: Option<ConstructId>,
}

impl Construct {
    /// Whether the block at `pos` belongs to this construct's own range.
    pub fn contains_pos(&self, pos: usize) -> bool {
        self.begin_pos <= pos && pos < self.end_pos
    }

    /// Whether the block at `pos` lies in this construct's scope, which for a loop also
    /// includes its continue construct.
    pub fn scope_contains_pos(&self, pos: usize) -> bool {
        self.begin_pos <= pos && pos < self.scope_end_pos
    }
}

impl Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}) blocks {}..{} depth {}",
            self.kind, self.begin_pos, self.end_pos, self.begin_id, self.end_id, self.depth
        )
    }
}
