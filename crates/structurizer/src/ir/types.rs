use std::fmt::{self, Display};

use serde::Serialize;

use crate::interfaces::{BlockId, CaseValue, Operation, ValueId};

/// A boolean condition in the structured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// An SSA value of the input function
    Value(ValueId),
    /// A synthesized guard variable
    Guard(String),
    /// Logical negation
    Not(Box<Expr>),
}

impl Expr {
    /// Negates `self`, folding a double negation.
    pub fn negate(self) -> Self {
        match self {
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Value(value) => write!(f, "%{value}"),
            Expr::Guard(name) => write!(f, "{name}"),
            Expr::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

/// One clause of a [`Stmt::Switch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseClause {
    /// The case values selecting this clause, in increasing order
    pub selectors: Vec<CaseValue>,
    /// Whether this clause is also the default clause
    pub is_default: bool,
    /// The clause body
    pub body: Vec<Stmt>,
}

/// A structured statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    /// A straight-line operation of the input, carried through unchanged
    Op(Operation),
    /// Marks where the statements of a basic block begin
    BlockMarker(BlockId),
    /// Declares a guard variable initialized to `true`
    DeclareGuard(String),
    /// Sets a guard variable to `false`
    ClearGuard(String),
    /// Two-way selection
    If {
        /// The condition
        condition: Expr,
        /// Runs when `condition` holds
        then_body: Vec<Stmt>,
        /// Runs otherwise
        else_body: Vec<Stmt>,
    },
    /// A loop with its continuing block
    Loop {
        /// The loop body
        body: Vec<Stmt>,
        /// Runs at the end of every iteration, and after every `continue`
        continuing: Vec<Stmt>,
    },
    /// Multi-way selection
    Switch {
        /// The integer selector
        selector: ValueId,
        /// The clauses, in block order
        cases: Vec<CaseClause>,
    },
    /// Leaves the innermost loop or switch
    Break,
    /// Jumps to the continuing block of the innermost loop
    Continue,
    /// Leaves the loop from its continuing block when the condition holds
    BreakIf(Expr),
    /// Returns from the function
    Return(Option<ValueId>),
    /// Aborts the invocation
    Discard,
}

/// The structured form of one input function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredFunction {
    /// The function's name
    pub name: String,
    /// The synthesized guard variables
    pub guards: Vec<String>,
    /// The function body
    pub body: Vec<Stmt>,
}
