//! Basic blocks.

use crate::instr::{Instruction, Opcode};
use crate::value::BlockId;

/// A maximal straight-line run of IL instructions with a single entry and,
/// once complete, a single terminator as its last instruction. `PHI` instructions, if any, sit at the front of
/// `instructions`; no other opcode may precede a phi in a block.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
    pub is_exit: bool,
}

impl BasicBlock {
    pub fn new(id: BlockId, label: impl Into<String>) -> Self {
        Self { id, label: label.into(), instructions: Vec::new(), predecessors: Vec::new(), successors: Vec::new(), is_exit: false }
    }

    /// Whether this block already ends in a terminator; once true, no
    /// further instruction may be appended, except
    /// via [`BasicBlock::replace_terminator`].
    pub fn is_terminated(&self) -> bool {
        self.instructions.last().is_some_and(Instruction::is_terminator)
    }

    pub fn push(&mut self, instr: Instruction) {
        debug_assert!(!self.is_terminated(), "cannot append past a block terminator");
        if instr.opcode == Opcode::Phi {
            // Phis are inserted at the head, in arrival order, preserving
            // any phis already present.
            let insert_at = self.instructions.iter().take_while(|i| i.opcode == Opcode::Phi).count();
            self.instructions.insert(insert_at, instr);
        } else {
            self.instructions.push(instr);
        }
    }

    /// Replaces an existing terminator (used by peephole passes that
    /// collapse `JMP` chains) rather than appending after it.
    pub fn replace_terminator(&mut self, instr: Instruction) {
        if self.is_terminated() {
            self.instructions.pop();
        }
        self.instructions.push(instr);
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    pub fn phis(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().take_while(|i| i.opcode == Opcode::Phi)
    }
}
