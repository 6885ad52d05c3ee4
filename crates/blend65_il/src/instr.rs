//! Typed three-address IL instructions.

use crate::value::{BlockId, RegisterId, Value};
use blend65_base::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Const,
    Undef,
    LoadMem,
    StoreMem,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Not,
    Neg,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    Branch,
    BranchIfTrue,
    BranchIfFalse,
    Label,
    Call,
    CallVoid,
    Return,
    ReturnVoid,
    Phi,
    Nop,
    HwRead,
    HwWrite,
}

impl Opcode {
    /// Whether an instruction with this opcode must be the last
    /// instruction in its basic block.
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Branch | Opcode::BranchIfTrue | Opcode::BranchIfFalse | Opcode::Return | Opcode::ReturnVoid)
    }

    /// Whether this opcode has an observable effect beyond producing its
    /// result register — the optimizer must never remove these.
    pub fn has_side_effects(self) -> bool {
        matches!(self, Opcode::Call | Opcode::CallVoid | Opcode::HwWrite | Opcode::StoreMem)
    }
}

/// A memory operand: a named global/local slot. The Static Frame
/// Allocator (`blend65_codegen`) later turns this into a fixed absolute
/// address; the IL only needs a stable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemSlot(pub String);

/// Operands an instruction may carry, beyond its plain `Value` operand
/// list — call targets, memory slots, and branch targets are not
/// themselves `Value`s.
#[derive(Debug, Clone)]
pub enum ExtraOperand {
    Mem(MemSlot),
    Callee(String),
    Target(BlockId),
    /// `(value, predecessor_block)` pairs for a `PHI`.
    PhiSources(Vec<(Value, BlockId)>),
    HwAddr(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(u32);

impl InstrId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// One IL instruction. Every instruction
/// carries a stable id, an optional source span, its operands, and an
/// optional result register.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub id: InstrId,
    pub opcode: Opcode,
    pub span: Option<Span>,
    pub operands: Vec<Value>,
    pub extra: Vec<ExtraOperand>,
    pub result: Option<RegisterId>,
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    pub fn has_side_effects(&self) -> bool {
        self.opcode.has_side_effects()
    }

    /// Branch targets this instruction jumps to, in operand order
    /// (`BRANCH_IF_TRUE`/`BRANCH_IF_FALSE` carry `[true_target,
    /// false_target]`; unconditional `BRANCH` carries one).
    pub fn branch_targets(&self) -> Vec<BlockId> {
        self.extra
            .iter()
            .filter_map(|e| match e {
                ExtraOperand::Target(b) => Some(*b),
                _ => None,
            })
            .collect()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(r) = self.result {
            write!(f, "{r} = ")?;
        }
        write!(f, "{:?}", self.opcode)?;
        for op in &self.operands {
            write!(f, " {op}")?;
        }
        for extra in &self.extra {
            match extra {
                ExtraOperand::Mem(m) => write!(f, " [{}]", m.0)?,
                ExtraOperand::Callee(name) => write!(f, " @{name}")?,
                ExtraOperand::Target(b) => write!(f, " -> {b}")?,
                ExtraOperand::PhiSources(sources) => {
                    write!(f, " {{")?;
                    for (i, (v, b)) in sources.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{v}@{b}")?;
                    }
                    write!(f, "}}")?;
                }
                ExtraOperand::HwAddr(addr) => write!(f, " ${addr:04X}")?,
            }
        }
        Ok(())
    }
}
