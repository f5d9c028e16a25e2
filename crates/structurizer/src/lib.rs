//! The Structurizer module rebuilds structured control flow from a function whose control flow
//! is only described by basic blocks, branch terminators and merge annotations.
//!
//! Every function goes through the same pipeline: its merge and continue declarations are
//! registered, its blocks are put in a structured order, the order is partitioned into nested
//! constructs, every edge is classified, and the order is finally replayed into a tree of
//! `if`, `loop`, `switch`, `break` and `continue` statements. Any violation of the structured
//! control-flow rules is reported as an [`Error`] naming the offending blocks.

/// Error types for the structurizer module
mod error;

mod core;
mod interfaces;
mod ir;

// re-export the public interface
pub use core::{
    structurize, BlockInfo, BlockRegistry, Construct, ConstructId, ConstructKind, EdgeKind,
    FunctionAnalysis, FunctionOutcome, FunctionStructurizer, GuardPlan, StructurizeResult,
    DEFAULT_GUARD_PREFIX, DEFAULT_INDENT_WIDTH,
};
pub use error::Error;
pub use interfaces::*;
pub use ir::{
    emit::PseudoCodeEmitter,
    types::{CaseClause, Expr, Stmt, StructuredFunction},
};
