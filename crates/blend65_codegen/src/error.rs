//! Internal invariant violations raised while generating ASM-IL from IL.
//!
//! Like [`blend65_il::InternalError`], these are compiler bugs, not
//! user-facing diagnostics: by the time code generation runs, IL
//! generation has already validated block well-formedness.

use std::fmt;

#[derive(Debug, Clone)]
pub enum InternalError {
    /// A function reached codegen with no blocks at all.
    EmptyFunction { function: String },
    /// A branch instruction's target block id does not exist in the
    /// function it was generated for.
    DanglingBranchTarget { function: String, block: String },
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::EmptyFunction { function } => {
                write!(f, "internal error: function `{function}` has no basic blocks")
            }
            InternalError::DanglingBranchTarget { function, block } => {
                write!(f, "internal error: function `{function}` branches to undefined block `{block}`")
            }
        }
    }
}

impl std::error::Error for InternalError {}

pub type Result<T> = std::result::Result<T, InternalError>;
