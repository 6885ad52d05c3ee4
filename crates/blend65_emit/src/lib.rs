//! # blend65_emit
//!
//! Serializes a [`blend65_codegen::AsmModule`] into ACME-compatible
//! assembler text, plus the optional BASIC auto-run stub.
//!
//! This crate only reads its input; nothing here mutates the ASM-IL
//! module (that is the optimizer's job, one layer down in
//! `blend65_codegen`).

pub mod basic_stub;
pub mod config;
pub mod debug;
pub mod emitter;

pub use config::{EmitterConfig, HexPrefix, IndentWidth, LineEnding};
pub use debug::{label_addresses, vice_label_file};
pub use emitter::{emit, EmitOutput};
