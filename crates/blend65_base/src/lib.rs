//! # blend65_base
//!
//! Pure structural atoms shared by every stage of the blend65 compilation
//! pipeline:
//!
//! - [`Arena`] — bump allocation for arena-backed AST/IL references
//! - [`Interner`]/[`Symbol`] — string interning for O(1) identifier equality
//! - [`Span`]/[`Position`] — source location tracking, with span merging
//! - [`Diagnostic`]/[`DiagnosticSink`] — structured error/warning records
//! - [`SpannedError`]/[`Result`] — errors for unrecoverable internal faults
//!
//! This crate has no knowledge of the blend65 grammar or type system. It
//! provides only generic, reusable infrastructure that higher-level crates
//! build on, the same separation the rest of the pipeline crates rely on.

pub mod arena;
pub mod diagnostic;
pub mod error;
pub mod intern;
pub mod span;

pub use arena::Arena;
pub use diagnostic::{Diagnostic, DiagnosticSink, Edit, Fix, RelatedInfo, Severity};
pub use error::{Result, SpannedError};
pub use intern::{Interner, Symbol, SymbolEq};
pub use span::{Position, Span};
