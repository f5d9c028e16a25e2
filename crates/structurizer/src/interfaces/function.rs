use std::fmt::{self, Display};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// The identifier of a basic block. `0` is reserved and means "no block".
pub type BlockId = u32;

/// The identifier of an SSA value (a branch condition, a switch selector or a return value).
pub type ValueId = u32;

/// A straight-line instruction inside a basic block. The structurizer never looks inside it; it
/// is carried through to the output unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(pub String);

impl Operation {
    /// Creates a new operation from its textual form.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl From<&str> for Operation {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for Operation {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The integer type of a switch selector. Every case literal of a switch is read in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signedness {
    /// Two's complement signed selector
    #[default]
    Signed,
    /// Unsigned selector
    Unsigned,
}

/// The 64-bit pattern of a switch case literal. Negative literals are stored as their two's
/// complement bits, so `-1` and `18446744073709551615` are the same literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CaseLiteral(pub u64);

impl CaseLiteral {
    /// Reads the literal in the selector's signedness.
    pub fn typed(self, signedness: Signedness) -> CaseValue {
        match signedness {
            Signedness::Signed => CaseValue::Signed(self.0 as i64),
            Signedness::Unsigned => CaseValue::Unsigned(self.0),
        }
    }
}

impl From<i64> for CaseLiteral {
    fn from(value: i64) -> Self {
        Self(value as u64)
    }
}

impl From<u64> for CaseLiteral {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for CaseLiteral {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Literal {
            Negative(i64),
            Bits(u64),
        }

        Ok(match Literal::deserialize(deserializer)? {
            Literal::Negative(value) => value.into(),
            Literal::Bits(value) => value.into(),
        })
    }
}

/// A case literal read in its switch's signedness, as it is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum CaseValue {
    /// A value of a signed selector
    Signed(i64),
    /// A value of an unsigned selector
    Unsigned(u64),
}

impl Display for CaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseValue::Signed(value) => write!(f, "{value}i"),
            CaseValue::Unsigned(value) => write!(f, "{value}u"),
        }
    }
}

/// One `(value, target)` entry of a switch terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// The literal selecting this case
    pub value: CaseLiteral,
    /// The block control transfers to when the selector equals `value`
    pub target: BlockId,
}

/// The structured-header annotation a block may carry right before its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeaderAnnotation {
    /// The block heads an if-selection or a switch-selection.
    SelectionMerge {
        /// The declared merge block of the selection
        merge: BlockId,
    },
    /// The block heads a loop.
    LoopMerge {
        /// The declared merge block of the loop
        merge: BlockId,
        /// The first block of the loop's continue construct
        continue_target: BlockId,
    },
}

impl HeaderAnnotation {
    /// The declared merge block.
    pub fn merge(&self) -> BlockId {
        match self {
            HeaderAnnotation::SelectionMerge { merge } |
            HeaderAnnotation::LoopMerge { merge, .. } => *merge,
        }
    }

    /// The declared continue target, for loop headers.
    pub fn continue_target(&self) -> Option<BlockId> {
        match self {
            HeaderAnnotation::SelectionMerge { .. } => None,
            HeaderAnnotation::LoopMerge { continue_target, .. } => Some(*continue_target),
        }
    }
}

/// The instruction ending a basic block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Terminator {
    /// Unconditional branch
    Branch {
        /// The branch target
        target: BlockId,
    },
    /// Two-way conditional branch
    BranchConditional {
        /// The boolean condition
        condition: ValueId,
        /// Taken when `condition` is true
        true_target: BlockId,
        /// Taken when `condition` is false
        false_target: BlockId,
    },
    /// N-way branch on an integer selector
    Switch {
        /// The integer selector
        selector: ValueId,
        /// The selector's type, which fixes how case literals are read
        #[serde(default)]
        signedness: Signedness,
        /// Taken when no case value matches
        default: BlockId,
        /// The `(value, target)` table
        #[serde(default)]
        cases: Vec<SwitchCase>,
    },
    /// Return from the function without a value
    Return,
    /// Return `value` from the function
    ReturnValue {
        /// The returned value
        value: ValueId,
    },
    /// Abort the invocation (fragment discard)
    Kill,
    /// Control never reaches the end of this block
    Unreachable,
}

impl Terminator {
    /// Shorthand for [`Terminator::Branch`].
    pub fn branch(target: BlockId) -> Self {
        Terminator::Branch { target }
    }

    /// Shorthand for [`Terminator::BranchConditional`].
    pub fn conditional(condition: ValueId, true_target: BlockId, false_target: BlockId) -> Self {
        Terminator::BranchConditional { condition, true_target, false_target }
    }

    /// Shorthand for a [`Terminator::Switch`] on a signed selector.
    pub fn switch(
        selector: ValueId,
        default: BlockId,
        cases: impl IntoIterator<Item = (i64, BlockId)>,
    ) -> Self {
        Terminator::Switch {
            selector,
            signedness: Signedness::Signed,
            default,
            cases: cases
                .into_iter()
                .map(|(value, target)| SwitchCase { value: value.into(), target })
                .collect(),
        }
    }

    /// Shorthand for a [`Terminator::Switch`] on an unsigned selector.
    pub fn unsigned_switch(
        selector: ValueId,
        default: BlockId,
        cases: impl IntoIterator<Item = (u64, BlockId)>,
    ) -> Self {
        Terminator::Switch {
            selector,
            signedness: Signedness::Unsigned,
            default,
            cases: cases
                .into_iter()
                .map(|(value, target)| SwitchCase { value: value.into(), target })
                .collect(),
        }
    }

    /// The branch targets in operand order: `[target]` for a branch, `[true, false]` for a
    /// conditional branch, `[default, case targets...]` for a switch. Duplicates are kept.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Branch { target } => vec![*target],
            Terminator::BranchConditional { true_target, false_target, .. } => {
                vec![*true_target, *false_target]
            }
            Terminator::Switch { default, cases, .. } => {
                std::iter::once(*default).chain(cases.iter().map(|case| case.target)).collect()
            }
            Terminator::Return |
            Terminator::ReturnValue { .. } |
            Terminator::Kill |
            Terminator::Unreachable => Vec::new(),
        }
    }

    /// The successors with duplicates removed, keeping the first occurrence of each.
    pub fn unique_successors(&self) -> Vec<BlockId> {
        let mut unique = Vec::new();
        for successor in self.successors() {
            if !unique.contains(&successor) {
                unique.push(successor);
            }
        }
        unique
    }
}

/// A basic block as handed over by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    /// The block's identifier, unique within its function
    pub id: BlockId,
    /// Straight-line operations, in program order
    #[serde(default)]
    pub operations: Vec<Operation>,
    /// The structured-header annotation, if this block heads a construct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<HeaderAnnotation>,
    /// The block terminator
    pub terminator: Terminator,
}

impl BasicBlock {
    /// Creates a block with no operations and no header annotation.
    pub fn new(id: BlockId, terminator: Terminator) -> Self {
        Self { id, operations: Vec::new(), merge: None, terminator }
    }

    /// Appends a straight-line operation.
    pub fn with_operation(mut self, operation: impl Into<Operation>) -> Self {
        self.operations.push(operation.into());
        self
    }

    /// Marks the block as a selection header merging at `merge`.
    pub fn with_selection_merge(mut self, merge: BlockId) -> Self {
        self.merge = Some(HeaderAnnotation::SelectionMerge { merge });
        self
    }

    /// Marks the block as a loop header merging at `merge` and continuing at `continue_target`.
    pub fn with_loop_merge(mut self, merge: BlockId, continue_target: BlockId) -> Self {
        self.merge = Some(HeaderAnnotation::LoopMerge { merge, continue_target });
        self
    }
}

/// A function body. The first block is the entry block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// The function's name, used for diagnostics and output
    pub name: String,
    /// The blocks in decoder order
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    /// Creates a function from its blocks.
    pub fn new(name: impl Into<String>, blocks: Vec<BasicBlock>) -> Self {
        Self { name: name.into(), blocks }
    }

    /// The entry block, if the function has any blocks.
    pub fn entry(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Looks a block up by id.
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.id == id)
    }
}

/// A collection of functions, the unit the `structurize` command operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// The functions of the module
    pub functions: Vec<Function>,
}

impl Module {
    /// Parses a module from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("failed to parse module: {e}")))
    }
}
