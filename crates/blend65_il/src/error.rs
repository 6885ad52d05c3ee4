//! Internal invariant violations raised while generating or validating IL.
//!
//! These are never user-facing: by the time IL generation runs, semantic
//! analysis has already rejected any input that could trigger these paths.
//! Seeing one means the IL generator itself has a bug.

use crate::value::BlockId;
use blend65_base::Span;
use std::fmt;

#[derive(Debug, Clone)]
pub enum InternalError {
    /// A block was left with no terminator at the end of generation.
    UnterminatedBlock { function: String, block: BlockId },
    /// A `PHI` instruction's predecessor set doesn't match the block's
    /// actual predecessors.
    PhiPredecessorMismatch { function: String, block: BlockId },
    /// A register was read before any instruction defined it.
    UseBeforeDef { function: String, span: Option<Span> },
    /// An intrinsic call (`peek`/`poke`/`hi`/`lo`) reached the generator
    /// with an arity or operand shape semantic analysis should have
    /// rejected.
    MalformedIntrinsic { name: String, span: Option<Span> },
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::UnterminatedBlock { function, block } => {
                write!(f, "internal error: function `{function}` block {block} has no terminator")
            }
            InternalError::PhiPredecessorMismatch { function, block } => {
                write!(f, "internal error: function `{function}` block {block} has a phi with mismatched predecessors")
            }
            InternalError::UseBeforeDef { function, span } => {
                write!(f, "internal error: function `{function}` uses a register before its definition")?;
                if let Some(span) = span {
                    write!(f, " at {span}")?;
                }
                Ok(())
            }
            InternalError::MalformedIntrinsic { name, span } => {
                write!(f, "internal error: intrinsic `{name}` reached IL generation with an invalid shape")?;
                if let Some(span) = span {
                    write!(f, " at {span}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for InternalError {}

pub type Result<T> = std::result::Result<T, InternalError>;
