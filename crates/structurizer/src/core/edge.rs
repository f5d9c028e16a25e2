use std::fmt::{self, Display};

use serde::Serialize;

/// The structured meaning of a control-flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Natural fall-through into the next part of the same construct
    Forward,
    /// From the tail of a continue construct back to its loop header
    Back,
    /// To the merge block of the innermost loop
    LoopBreak,
    /// To the continue target of the innermost loop
    LoopContinue,
    /// To the merge block of the innermost if-selection
    IfBreak,
    /// To the merge block of the innermost switch-selection
    SwitchBreak,
}

impl Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Forward => write!(f, "forward"),
            EdgeKind::Back => write!(f, "back"),
            EdgeKind::LoopBreak => write!(f, "loop-break"),
            EdgeKind::LoopContinue => write!(f, "loop-continue"),
            EdgeKind::IfBreak => write!(f, "if-break"),
            EdgeKind::SwitchBreak => write!(f, "switch-break"),
        }
    }
}
