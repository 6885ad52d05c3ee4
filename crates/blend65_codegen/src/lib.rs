//! # blend65_codegen
//!
//! Turns typed IL ([`blend65_il::IlModule`]) into target-specific 6502
//! assembly, modeled as a typed instruction list ([`asmil::AsmModule`])
//! rather than raw text. Also owns the
//! target descriptor, the optimizer
//! pass manager, and the static frame allocator that assigns
//! zero-page and RAM storage to source-level locals and globals.

pub mod asmil;
pub mod codegen;
pub mod error;
pub mod pass;
pub mod passes;
pub mod sfa;
pub mod target;

pub use asmil::{AddressingMode, AsmItem, AsmModule, CommentStyle, DataPayload, LabelKind, Operand};
pub use codegen::{generate, instruction_size_and_cycles, CodegenOutput, CodegenStats};
pub use error::InternalError;
pub use pass::{AsmPassManager, IlPassManager, OptLevel, PassStat};
pub use passes::{AdcIncPass, DeadStoreEliminationPass, IntrinsicLoweringPass, JmpChainCollapsePass, RedundantLoadPass, TaxTxaPairPass};
pub use sfa::{allocate, Placement, RamReservation, SfaOutput};
pub use target::{Target, TargetConfig, TargetNotImplemented};
