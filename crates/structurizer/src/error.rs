//! Structurizer errors
//!
//! Every structuring failure is fatal for the function being translated. The seven control-flow
//! categories carry the diagnostic verbatim, naming the offending block ids.

/// Generic error type for the structurizer module
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A block diverges to several blocks without declaring a structured header
    #[error("{0}")]
    MissingMerge(String),
    /// A merge or continue declaration is invalid, reused, self-referential or not dominated
    #[error("{0}")]
    MalformedMerge(String),
    /// A backward edge outside the tail of a continue construct
    #[error("{0}")]
    IllegalBackedge(String),
    /// An edge leaves a construct through something other than its merge or continue target
    #[error("{0}")]
    StructuredExitViolation(String),
    /// A continue construct is left other than through its tail
    #[error("{0}")]
    ContinueConstructViolation(String),
    /// A switch case or default target is duplicated, escapes, or falls through
    #[error("{0}")]
    SwitchCaseViolation(String),
    /// A block is reachable along a path that bypasses the header that should dominate it
    #[error("{0}")]
    DominanceViolation(String),
    /// The input module or function is malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// An internal invariant was broken
    #[error("Internal error: {0}")]
    Internal(String),
    /// Generic error
    #[error("Error: {0}")]
    Eyre(#[from] eyre::Report),
}

impl Error {
    /// A short name for the error category, used when summarizing failures.
    pub fn category(&self) -> &'static str {
        match self {
            Error::MissingMerge(_) => "missing merge",
            Error::MalformedMerge(_) => "malformed merge",
            Error::IllegalBackedge(_) => "illegal backedge",
            Error::StructuredExitViolation(_) => "structured exit violation",
            Error::ContinueConstructViolation(_) => "continue construct violation",
            Error::SwitchCaseViolation(_) => "switch case violation",
            Error::DominanceViolation(_) => "dominance violation",
            Error::InvalidInput(_) => "invalid input",
            Error::Internal(_) | Error::Eyre(_) => "internal",
        }
    }
}
