//! Error types with source location tracking.
//!
//! Most failures in blend65 are not `Result::Err` at all — they are
//! [`Diagnostic`]s accumulated into a [`DiagnosticSink`] (see
//! [`crate::diagnostic`]). `SpannedError` is reserved for the small set of
//! truly fatal conditions (internal invariant violations) that a phase
//! cannot recover from and continue walking the rest of the input.

use crate::span::Span;
use std::fmt;

/// An error annotated with its source location. Used only for conditions
/// a phase cannot recover from (see module docs).
#[derive(Debug, Clone)]
pub struct SpannedError {
    pub message: String,
    pub span: Span,
}

impl SpannedError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }
}

impl fmt::Display for SpannedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for SpannedError {}

pub type Result<T> = std::result::Result<T, SpannedError>;
