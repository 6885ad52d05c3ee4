//! IL functions.

use crate::block::BasicBlock;
use crate::instr::{ExtraOperand, Instruction, InstrId, MemSlot, Opcode};
use crate::value::{BlockId, RegisterId, Value};
use blend65_base::Span;
use blend65_types::TypeInfo;
use std::rc::Rc;

/// A parameter is backed by a memory slot, not a register: the Static
/// Frame Allocator places it in the function's frame, and the calling
/// convention is responsible for it holding the argument's value on
/// entry. Reads
/// go through the same `LOAD_MEM` path as any other named variable.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub slot: MemSlot,
    pub ty: Rc<TypeInfo>,
}

/// One function's IL. Owns its blocks; blocks
/// reference each other only by [`BlockId`].
#[derive(Debug, Clone)]
pub struct IlFunction {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Rc<TypeInfo>,
    pub entry_block: BlockId,
    pub blocks: Vec<BasicBlock>,
    next_register: u32,
    next_instr: u32,
}

impl IlFunction {
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>, return_type: Rc<TypeInfo>) -> Self {
        let mut f = Self { name: name.into(), parameters, return_type, entry_block: BlockId::new(0), blocks: Vec::new(), next_register: 0, next_instr: 0 };
        let entry = f.new_block("entry");
        f.entry_block = entry;
        f
    }

    pub fn fresh_register(&mut self, ty: Rc<TypeInfo>) -> Value {
        let id = RegisterId::new(self.next_register);
        self.next_register += 1;
        Value::Register(id, ty)
    }

    fn fresh_instr_id(&mut self) -> InstrId {
        let id = InstrId::new(self.next_instr);
        self.next_instr += 1;
        id
    }

    pub fn new_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id, label));
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// Marks `to` as one of `from`'s successors and `from` as one of
    /// `to`'s predecessors. Call sites are responsible for actually
    /// emitting the branch/terminator instruction; this only threads the
    /// graph edges (mirrors `blend65_sema::cfg::Cfg::connect`).
    pub fn connect(&mut self, from: BlockId, to: BlockId) {
        if !self.block(from).successors.contains(&to) {
            self.block_mut(from).successors.push(to);
        }
        if !self.block(to).predecessors.contains(&from) {
            self.block_mut(to).predecessors.push(from);
        }
    }

    /// Appends an instruction to `block`, threading a fresh [`InstrId`]
    /// and returning the instruction's result value, if it produces one.
    pub fn emit(&mut self, block: BlockId, opcode: Opcode, operands: Vec<Value>, extra: Vec<ExtraOperand>, result_ty: Option<Rc<TypeInfo>>, span: Option<Span>) -> Option<Value> {
        let id = self.fresh_instr_id();
        let result_value = result_ty.map(|ty| self.fresh_register(ty));
        let result = result_value.as_ref().and_then(Value::as_register);
        let instr = Instruction { id, opcode, span, operands, extra, result };
        self.block_mut(block).push(instr);
        result_value
    }

    /// True once every block ends in exactly one terminator.
    pub fn is_well_formed(&self) -> bool {
        self.blocks.iter().all(|b| !b.instructions.is_empty() && b.is_terminated())
    }
}
