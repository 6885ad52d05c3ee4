//! The IL-to-ASM-IL code generator.
//!
//! Walks each [`IlFunction`] block by block and emits [`AsmItem`]s. Every
//! source-level local/parameter already has a fixed address from
//! [`crate::sfa::allocate`]; IL registers (the SSA temporaries the
//! generator itself introduced) are the code generator's own concern —
//! they are not part of the source program's frame, so each function gets
//! a small private scratch area in general RAM sized to its own register
//! count, independent of the SFA's zero-page budget (see DESIGN.md).

use crate::asmil::{AddressingMode, AsmItem, AsmModule, CommentStyle, DataPayload, LabelKind, Operand};
use crate::sfa::{Placement, SfaOutput};
use crate::target::TargetConfig;
use blend65_base::{Diagnostic, DiagnosticSink};
use blend65_il::{BlockId, ExtraOperand, IlFunction, IlModule, Instruction, Opcode, RegisterId, Value};
use blend65_types::TypeInfo;
use rustc_hash::FxHashMap;

/// Counters the code generator records as it walks the module: code
/// size, data size, zero-page bytes used, function count, global count,
/// and total size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodegenStats {
    pub code_size: u32,
    pub data_size: u32,
    pub zp_bytes_used: u32,
    pub function_count: u32,
    pub global_count: u32,
    pub total_size: u32,
}

pub struct CodegenOutput {
    pub module: AsmModule,
    pub stats: CodegenStats,
    pub diagnostics: DiagnosticSink,
}

/// A place an IL value currently lives: a source-level slot the SFA
/// placed, or one of this function's own register scratch cells.
#[derive(Clone)]
enum Loc {
    ZeroPage(u8),
    Ram { label: String, offset: u16 },
}

impl Loc {
    fn plus(&self, delta: u16) -> Loc {
        match self {
            Loc::ZeroPage(a) => Loc::ZeroPage(a.wrapping_add(delta as u8)),
            Loc::Ram { label, offset } => Loc::Ram { label: label.clone(), offset: offset + delta },
        }
    }

    fn operand(&self) -> (AddressingMode, Operand) {
        match self {
            Loc::ZeroPage(a) => (AddressingMode::ZeroPage, Operand::Address(*a as u16)),
            Loc::Ram { label, offset } => {
                let text = if *offset == 0 { label.clone() } else { format!("{label}+{offset}") };
                (AddressingMode::Absolute, Operand::Label(text))
            }
        }
    }

    /// This location's base address, addressed with the runtime offset
    /// already loaded into `X` (`a[i]`'s element address is `base + i *
    /// width`, computed by the IL generator's `MUL` and carried into `X`
    /// by the caller).
    fn indexed_operand(&self) -> (AddressingMode, Operand) {
        match self {
            Loc::ZeroPage(a) => (AddressingMode::ZeroPageX, Operand::Address(*a as u16)),
            Loc::Ram { label, offset } => {
                let text = if *offset == 0 { label.clone() } else { format!("{label}+{offset}") };
                (AddressingMode::AbsoluteX, Operand::Label(text))
            }
        }
    }
}

fn loc_from_placement(p: &Placement) -> Loc {
    match p {
        Placement::ZeroPage(a) => Loc::ZeroPage(*a),
        Placement::Ram { label, offset } => Loc::Ram { label: label.clone(), offset: *offset },
    }
}

/// Per-function scratch storage for IL registers. Registers are assigned
/// slots in first-use order and never reused across functions; this is
/// simple and deterministic rather than space-optimal, which is
/// acceptable since this scratch area competes with general RAM, not the
/// zero-page budget the SFA is protecting.
struct RegisterFile {
    label: String,
    offsets: FxHashMap<RegisterId, (u16, u32)>,
    size: u32,
}

impl RegisterFile {
    fn build(func: &IlFunction, function_label: &str) -> RegisterFile {
        let mut offsets = FxHashMap::default();
        let mut cursor = 0u16;
        for block in &func.blocks {
            for instr in &block.instructions {
                if let Some(reg) = instr.result {
                    if offsets.contains_key(&reg) {
                        continue;
                    }
                    let width = instr
                        .operands
                        .iter()
                        .find_map(Value::ty)
                        .map(|t| t.width().max(1))
                        .unwrap_or(1);
                    offsets.insert(reg, (cursor, width));
                    cursor += width as u16;
                }
            }
        }
        RegisterFile { label: format!("_regs{function_label}"), offsets, size: cursor as u32 }
    }

    fn loc(&self, reg: RegisterId) -> Loc {
        let (offset, _) = self.offsets.get(&reg).copied().unwrap_or((0, 1));
        Loc::Ram { label: self.label.clone(), offset }
    }
}

struct FunctionCtx<'a> {
    module: &'a IlModule,
    sfa: &'a SfaOutput,
    regs: RegisterFile,
    label_counter: u32,
}

impl<'a> FunctionCtx<'a> {
    fn value_loc(&self, v: &Value) -> Option<Loc> {
        match v {
            Value::Register(id, _) => Some(self.regs.loc(*id)),
            _ => None,
        }
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        self.label_counter += 1;
        format!(".{prefix}{}", self.label_counter)
    }
}

fn sanitize(name: &str) -> String {
    name.replace('.', "_")
}

fn mem_loc(sfa: &SfaOutput, instr: &Instruction) -> Option<Loc> {
    instr.extra.iter().find_map(|e| match e {
        ExtraOperand::Mem(m) => sfa.placements.get(&m.0).map(loc_from_placement),
        _ => None,
    })
}

fn callee_name(instr: &Instruction) -> Option<&str> {
    instr.extra.iter().find_map(|e| match e {
        ExtraOperand::Callee(c) => Some(c.as_str()),
        _ => None,
    })
}

/// Generates ASM-IL for a whole module: globals, then one function body
/// after another, preceded by a BASIC-stub-friendly `Origin`.
pub fn generate(module: &IlModule, sfa: &SfaOutput, target: &TargetConfig) -> CodegenOutput {
    let mut out = AsmModule::new();
    let mut diagnostics = DiagnosticSink::default();
    let mut stats = CodegenStats::default();

    out.push(AsmItem::Origin(target.default_load_address));
    out.push(AsmItem::BlankLine);

    emit_global_initializers(module, sfa, &mut out);

    // Program entry: call the entry point (if any), then loop forever —
    // there is no OS to return control to on a bare-metal C64 program.
    if let Some(entry) = &module.entry_point {
        out.push(AsmItem::Comment { text: format!("entry point: {entry}"), style: CommentStyle::Standalone });
        out.push(AsmItem::instr("JSR", AddressingMode::Absolute, Some(Operand::Label(format!("_{}", sanitize(entry))))));
    }
    out.push(AsmItem::Label { name: ".halt".into(), kind: LabelKind::Temp, span: None });
    out.push(AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label(".halt".into()))));
    out.push(AsmItem::BlankLine);

    for func in &module.functions {
        generate_function(func, module, sfa, &mut out, &mut diagnostics);
        stats.function_count += 1;
    }

    emit_ram_reservations(sfa, module, &mut out);

    stats.global_count = module.globals.len() as u32;
    stats.zp_bytes_used = sfa.zp_bytes_used;
    stats.code_size = out.items.iter().map(AsmItem::size_bytes).sum();
    stats.data_size = out.items.iter().filter(|i| matches!(i, AsmItem::Data { .. })).map(AsmItem::size_bytes).sum();
    stats.total_size = stats.code_size;

    CodegenOutput { module: out, stats, diagnostics }
}

/// Emits `LDA #lo; STA addr` (and a high-byte pair for words) for every
/// global whose `let` carries a constant-foldable initializer, right
/// before control transfers to the entry point. Globals with no
/// initializer rely on cold-start RAM already reading as zero.
fn emit_global_initializers(module: &IlModule, sfa: &SfaOutput, out: &mut AsmModule) {
    for global in &module.globals {
        let Some(init) = global.init else { continue };
        let Some(loc) = sfa.placements.get(&global.slot.0).map(loc_from_placement) else { continue };
        let width = global.ty.width().max(1);
        let lo = (init & 0xFF) as u8;
        out.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(Operand::Immediate(lo))));
        let (mode, op) = loc.operand();
        out.push(AsmItem::instr("STA", mode, Some(op)));
        if width >= 2 {
            let hi = ((init >> 8) & 0xFF) as u8;
            out.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(Operand::Immediate(hi))));
            let (mode, op) = loc.plus(1).operand();
            out.push(AsmItem::instr("STA", mode, Some(op)));
        }
    }
}

fn emit_ram_reservations(sfa: &SfaOutput, module: &IlModule, out: &mut AsmModule) {
    out.push(AsmItem::Comment { text: "general RAM (SFA overflow + register scratch)".into(), style: CommentStyle::Standalone });
    for reservation in &sfa.ram_reservations {
        out.push(AsmItem::Label { name: reservation.label.clone(), kind: LabelKind::Temp, span: None });
        out.push(AsmItem::Data { payload: DataPayload::Fill { count: reservation.size_bytes, value: 0 }, comment: None });
    }
    for func in &module.functions {
        let regs = RegisterFile::build(func, &format!("_{}", sanitize(&func.name)));
        if regs.size > 0 {
            out.push(AsmItem::Label { name: regs.label.clone(), kind: LabelKind::Temp, span: None });
            out.push(AsmItem::Data { payload: DataPayload::Fill { count: regs.size, value: 0 }, comment: None });
        }
    }
}

fn generate_function(func: &IlFunction, module: &IlModule, sfa: &SfaOutput, out: &mut AsmModule, diagnostics: &mut DiagnosticSink) {
    let func_label = format!("_{}", sanitize(&func.name));
    out.push(AsmItem::Label { name: func_label.clone(), kind: LabelKind::Exported, span: None });
    out.push(AsmItem::BlankLine);

    let regs = RegisterFile::build(func, &format!("_{}", sanitize(&func.name)));
    let mut ctx = FunctionCtx { module, sfa, regs, label_counter: 0 };
    let phi_copies = collect_phi_copies(func);

    for block in &func.blocks {
        out.push(AsmItem::Label { name: format!(".Lb{}", block.id.index()), kind: LabelKind::Block, span: None });
        let terminator_at = block.instructions.iter().position(|i| i.is_terminator());
        for (idx, instr) in block.instructions.iter().enumerate() {
            if Some(idx) == terminator_at {
                if let Some(copies) = phi_copies.get(&block.id) {
                    for (dest, src) in copies {
                        emit_copy(&mut ctx, out, dest, src);
                    }
                }
            }
            generate_instruction(&mut ctx, instr, out, diagnostics);
        }
        if terminator_at.is_none() {
            // Synthesized fall-through for a void function's missing
            // terminator; should not occur once the IL
            // generator ran, but codegen stays defensive.
            out.push(AsmItem::instr("RTS", AddressingMode::Implied, None));
        }
    }
    out.push(AsmItem::BlankLine);
}

/// `(result_register, source_value)` copies that must run at the end of
/// each predecessor block, implementing phi nodes without a dedicated
/// SSA-destruction pass: every `PHI` at a block's head contributes one
/// copy per predecessor edge.
fn collect_phi_copies(func: &IlFunction) -> FxHashMap<BlockId, Vec<(RegisterId, Value)>> {
    let mut map: FxHashMap<BlockId, Vec<(RegisterId, Value)>> = FxHashMap::default();
    for block in &func.blocks {
        for instr in block.phis() {
            let Some(result) = instr.result else { continue };
            for extra in &instr.extra {
                if let ExtraOperand::PhiSources(sources) = extra {
                    for (value, pred) in sources {
                        map.entry(*pred).or_default().push((result, value.clone()));
                    }
                }
            }
        }
    }
    map
}

fn emit_copy(ctx: &mut FunctionCtx, out: &mut AsmModule, dest: &RegisterId, src: &Value) {
    let dest_loc = ctx.regs.loc(*dest);
    let width = src.ty().map(|t| t.width().max(1)).unwrap_or(1);
    load_value_into_a(ctx, out, src, 0);
    let (mode, op) = dest_loc.operand();
    out.push(AsmItem::instr("STA", mode, Some(op)));
    if width >= 2 {
        load_value_into_a(ctx, out, src, 1);
        let (mode, op) = dest_loc.plus(1).operand();
        out.push(AsmItem::instr("STA", mode, Some(op)));
    }
}

/// Loads byte `byte_index` (0 = low, 1 = high) of `value` into `A`.
fn load_value_into_a(ctx: &FunctionCtx, out: &mut AsmModule, value: &Value, byte_index: u16) {
    match value {
        Value::Constant(v, _) => {
            let byte = if byte_index == 0 { (*v & 0xFF) as u8 } else { ((*v >> 8) & 0xFF) as u8 };
            out.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(Operand::Immediate(byte))));
        }
        Value::Register(id, _) => {
            let loc = ctx.regs.loc(*id).plus(byte_index);
            let (mode, op) = loc.operand();
            out.push(AsmItem::instr("LDA", mode, Some(op)));
        }
        Value::Label(_) => {}
    }
}

/// Loads an index/offset value's low byte into `X`, the register the
/// 6502's `,X` addressing modes read. Array lengths are bounded well
/// under 256 elements (`spec.md` §3's `array(T, n)`), so the high byte
/// of a byte-offset value is never significant here.
fn load_offset_into_x(ctx: &FunctionCtx, out: &mut AsmModule, offset: &Value) {
    load_value_into_a(ctx, out, offset, 0);
    out.push(AsmItem::instr("TAX", AddressingMode::Implied, None));
}

fn store_a_into(out: &mut AsmModule, loc: &Loc) {
    let (mode, op) = loc.operand();
    out.push(AsmItem::instr("STA", mode, Some(op)));
}

fn width_of(instr: &Instruction) -> u32 {
    instr
        .operands
        .iter()
        .find_map(Value::ty)
        .map(|t| t.width().max(1))
        .unwrap_or(1)
}

fn generate_instruction(ctx: &mut FunctionCtx, instr: &Instruction, out: &mut AsmModule, diagnostics: &mut DiagnosticSink) {
    match instr.opcode {
        Opcode::Const | Opcode::Undef => {
            let Some(result) = instr.result else { return };
            let dest = ctx.regs.loc(result);
            let width = instr.operands.first().and_then(Value::ty).map(|t| t.width().max(1)).unwrap_or_else(|| {
                instr_result_width(ctx, instr)
            });
            let value = if instr.opcode == Opcode::Const { instr.operands.first().and_then(Value::as_constant).unwrap_or(0) } else { 0 };
            let lo = (value & 0xFF) as u8;
            out.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(Operand::Immediate(lo))).with_span(instr.span));
            store_a_into(out, &dest);
            if width >= 2 {
                let hi = ((value >> 8) & 0xFF) as u8;
                out.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(Operand::Immediate(hi))));
                store_a_into(out, &dest.plus(1));
            }
        }
        Opcode::LoadMem => {
            let Some(result) = instr.result else { return };
            let Some(src) = mem_loc(ctx.sfa, instr) else { return };
            let dest = ctx.regs.loc(result);
            let width = dest_width(ctx, result);
            // `a[i]` carries its runtime byte offset as the first
            // operand; a plain identifier load has none.
            if let Some(offset) = instr.operands.first() {
                load_offset_into_x(ctx, out, offset);
                let (mode, op) = src.indexed_operand();
                out.push(AsmItem::instr("LDA", mode, Some(op)).with_span(instr.span));
                store_a_into(out, &dest);
                if width >= 2 {
                    out.push(AsmItem::instr("INX", AddressingMode::Implied, None));
                    let (mode, op) = src.indexed_operand();
                    out.push(AsmItem::instr("LDA", mode, Some(op)));
                    store_a_into(out, &dest.plus(1));
                }
            } else {
                let (mode, op) = src.operand();
                out.push(AsmItem::instr("LDA", mode, Some(op)).with_span(instr.span));
                store_a_into(out, &dest);
                if width >= 2 {
                    let (mode, op) = src.plus(1).operand();
                    out.push(AsmItem::instr("LDA", mode, Some(op)));
                    store_a_into(out, &dest.plus(1));
                }
            }
        }
        Opcode::StoreMem => {
            let Some(dest) = mem_loc(ctx.sfa, instr) else { return };
            // `a[i] = v` carries `[offset, v]`; a plain identifier store
            // carries just `[v]`.
            if instr.operands.len() >= 2 {
                let offset = &instr.operands[0];
                let value = &instr.operands[1];
                let width = value.ty().map(|t| t.width().max(1)).unwrap_or(1);
                load_offset_into_x(ctx, out, offset);
                load_value_into_a(ctx, out, value, 0);
                let (mode, op) = dest.indexed_operand();
                out.push(AsmItem::instr("STA", mode, Some(op)).with_span(instr.span));
                if width >= 2 {
                    load_value_into_a(ctx, out, value, 1);
                    out.push(AsmItem::instr("INX", AddressingMode::Implied, None));
                    let (mode, op) = dest.indexed_operand();
                    out.push(AsmItem::instr("STA", mode, Some(op)));
                }
            } else if let Some(value) = instr.operands.first() {
                let width = value.ty().map(|t| t.width().max(1)).unwrap_or(1);
                load_value_into_a(ctx, out, value, 0);
                store_a_into(out, &dest);
                if width >= 2 {
                    load_value_into_a(ctx, out, value, 1);
                    store_a_into(out, &dest.plus(1));
                }
            }
        }
        Opcode::Add | Opcode::Sub | Opcode::And | Opcode::Or | Opcode::Xor => {
            emit_binary_arith(ctx, instr, out);
        }
        Opcode::Mul | Opcode::Div | Opcode::Mod => {
            diagnostics.push(Diagnostic::warning(
                "S101",
                format!("`{:?}` has no direct 6502 opcode; a runtime helper routine is required and was not linked", instr.opcode),
                instr.span.unwrap_or_default(),
            ));
            out.push(AsmItem::instr("NOP", AddressingMode::Implied, None).with_span(instr.span));
        }
        Opcode::Shl | Opcode::Shr => emit_shift(ctx, instr, out, diagnostics),
        Opcode::Not => emit_not(ctx, instr, out),
        Opcode::Neg => emit_neg(ctx, instr, out),
        Opcode::CmpEq | Opcode::CmpNe | Opcode::CmpLt | Opcode::CmpLe | Opcode::CmpGt | Opcode::CmpGe => {
            emit_compare(ctx, instr, out);
        }
        Opcode::Branch => {
            if let Some(target) = instr.branch_targets().first() {
                out.push(AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label(format!(".Lb{}", target.index())))).with_span(instr.span));
            }
        }
        Opcode::BranchIfTrue | Opcode::BranchIfFalse => {
            let targets = instr.branch_targets();
            let (taken, fallthrough) = match (targets.first(), targets.get(1)) {
                (Some(a), Some(b)) => (*a, *b),
                _ => return,
            };
            if let Some(cond) = instr.operands.first() {
                load_value_into_a(ctx, out, cond, 0);
            }
            let mnemonic = if instr.opcode == Opcode::BranchIfTrue { "BNE" } else { "BEQ" };
            out.push(AsmItem::instr(mnemonic, AddressingMode::Relative, Some(Operand::Label(format!(".Lb{}", taken.index())))).with_span(instr.span));
            out.push(AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label(format!(".Lb{}", fallthrough.index())))));
        }
        Opcode::Label | Opcode::Nop | Opcode::Phi => {}
        Opcode::Call | Opcode::CallVoid => emit_call(ctx, instr, out),
        Opcode::Return => {
            if let Some(value) = instr.operands.first() {
                let width = value.ty().map(|t| t.width().max(1)).unwrap_or(1);
                load_value_into_a(ctx, out, value, 0);
                if width >= 2 {
                    // Word results come back in A (lo) and X (hi): move the
                    // high byte from a scratch load into X via TAX after A
                    // has been consumed by the caller's own store, so stash
                    // it through the register file instead of clobbering A.
                    out.push(AsmItem::instr("PHA", AddressingMode::Implied, None));
                    load_value_into_a(ctx, out, value, 1);
                    out.push(AsmItem::instr("TAX", AddressingMode::Implied, None));
                    out.push(AsmItem::instr("PLA", AddressingMode::Implied, None));
                }
            }
            out.push(AsmItem::instr("RTS", AddressingMode::Implied, None).with_span(instr.span));
        }
        Opcode::ReturnVoid => {
            out.push(AsmItem::instr("RTS", AddressingMode::Implied, None).with_span(instr.span));
        }
        Opcode::HwRead => {
            let Some(result) = instr.result else { return };
            match instr.operands.first().and_then(Value::as_constant) {
                Some(addr) => {
                    out.push(AsmItem::instr("LDA", AddressingMode::Absolute, Some(Operand::Address(addr as u16))).with_span(instr.span));
                    store_a_into(out, &ctx.regs.loc(result));
                }
                None => diagnostics.push(Diagnostic::warning(
                    "S101",
                    "peek() with a non-constant address is not supported by this code generator".to_string(),
                    instr.span.unwrap_or_default(),
                )),
            }
        }
        Opcode::HwWrite => {
            let Some(addr_value) = instr.operands.first() else { return };
            match addr_value.as_constant() {
                Some(addr) => {
                    if let Some(value) = instr.operands.get(1) {
                        load_value_into_a(ctx, out, value, 0);
                    }
                    out.push(AsmItem::instr("STA", AddressingMode::Absolute, Some(Operand::Address(addr as u16))).with_span(instr.span));
                }
                None => diagnostics.push(Diagnostic::warning(
                    "S101",
                    "poke() with a non-constant address is not supported by this code generator".to_string(),
                    instr.span.unwrap_or_default(),
                )),
            }
        }
    }
}

fn dest_width(ctx: &FunctionCtx, result: RegisterId) -> u32 {
    ctx.regs.offsets.get(&result).map(|(_, w)| *w).unwrap_or(1)
}

fn instr_result_width(ctx: &FunctionCtx, instr: &Instruction) -> u32 {
    instr.result.map(|r| dest_width(ctx, r)).unwrap_or(1)
}

fn emit_binary_arith(ctx: &mut FunctionCtx, instr: &Instruction, out: &mut AsmModule) {
    let (Some(lhs), Some(rhs)) = (instr.operands.first(), instr.operands.get(1)) else { return };
    let Some(result) = instr.result else { return };
    let dest = ctx.regs.loc(result);
    let width = width_of(instr).max(dest_width(ctx, result));
    let (add_mnemonic, carry_setup) = match instr.opcode {
        Opcode::Add => ("ADC", Some("CLC")),
        Opcode::Sub => ("SBC", Some("SEC")),
        Opcode::And => ("AND", None),
        Opcode::Or => ("ORA", None),
        Opcode::Xor => ("EOR", None),
        _ => unreachable!(),
    };
    for byte in 0..width.min(2) {
        load_value_into_a(ctx, out, lhs, byte as u16);
        if byte == 0 {
            if let Some(setup) = carry_setup {
                out.push(AsmItem::instr(setup, AddressingMode::Implied, None));
            }
        }
        let rhs_loc = ctx.value_loc(rhs);
        match (rhs_loc, rhs) {
            (_, Value::Constant(v, _)) => {
                let byte_val = if byte == 0 { (*v & 0xFF) as u8 } else { ((*v >> 8) & 0xFF) as u8 };
                out.push(AsmItem::instr(add_mnemonic, AddressingMode::Immediate, Some(Operand::Immediate(byte_val))).with_span(instr.span));
            }
            (Some(loc), _) => {
                let (mode, op) = loc.plus(byte as u16).operand();
                out.push(AsmItem::instr(add_mnemonic, mode, Some(op)).with_span(instr.span));
            }
            _ => {}
        }
        store_a_into(out, &dest.plus(byte as u16));
    }
}

fn emit_shift(ctx: &mut FunctionCtx, instr: &Instruction, out: &mut AsmModule, diagnostics: &mut DiagnosticSink) {
    let (Some(lhs), Some(rhs)) = (instr.operands.first(), instr.operands.get(1)) else { return };
    let Some(result) = instr.result else { return };
    let dest = ctx.regs.loc(result);
    let mnemonic = if instr.opcode == Opcode::Shl { "ASL" } else { "LSR" };
    load_value_into_a(ctx, out, lhs, 0);
    match rhs.as_constant() {
        Some(count) => {
            for _ in 0..count {
                out.push(AsmItem::instr(mnemonic, AddressingMode::Accumulator, None).with_span(instr.span));
            }
        }
        None => {
            diagnostics.push(Diagnostic::warning(
                "S101",
                "variable shift amount is not constant-folded; emitting a single shift".to_string(),
                instr.span.unwrap_or_default(),
            ));
            out.push(AsmItem::instr(mnemonic, AddressingMode::Accumulator, None));
        }
    }
    store_a_into(out, &dest);
}

/// `NOT` serves both logical `!` (`bool -> bool`) and bitwise `~`
/// (`numeric -> same width`); the operand's type is the only thing that
/// tells them apart, since both fold to the same opcode. `!` flips just
/// bit 0 (its operand is always 0 or 1); `~` complements every bit of
/// every byte the operand's width occupies.
fn emit_not(ctx: &mut FunctionCtx, instr: &Instruction, out: &mut AsmModule) {
    let Some(value) = instr.operands.first() else { return };
    let Some(result) = instr.result else { return };
    let is_logical = matches!(value.ty().as_deref(), Some(TypeInfo::Bool));
    if is_logical {
        load_value_into_a(ctx, out, value, 0);
        out.push(AsmItem::instr("EOR", AddressingMode::Immediate, Some(Operand::Immediate(0x01))).with_span(instr.span));
        store_a_into(out, &ctx.regs.loc(result));
        return;
    }
    let width = value.ty().map(|t| t.width().max(1)).unwrap_or(1);
    load_value_into_a(ctx, out, value, 0);
    out.push(AsmItem::instr("EOR", AddressingMode::Immediate, Some(Operand::Immediate(0xFF))).with_span(instr.span));
    store_a_into(out, &ctx.regs.loc(result));
    if width >= 2 {
        load_value_into_a(ctx, out, value, 1);
        out.push(AsmItem::instr("EOR", AddressingMode::Immediate, Some(Operand::Immediate(0xFF))));
        store_a_into(out, &ctx.regs.loc(result).plus(1));
    }
}

fn emit_neg(ctx: &mut FunctionCtx, instr: &Instruction, out: &mut AsmModule) {
    let Some(value) = instr.operands.first() else { return };
    let Some(result) = instr.result else { return };
    load_value_into_a(ctx, out, value, 0);
    out.push(AsmItem::instr("EOR", AddressingMode::Immediate, Some(Operand::Immediate(0xFF))).with_span(instr.span));
    out.push(AsmItem::instr("CLC", AddressingMode::Implied, None));
    out.push(AsmItem::instr("ADC", AddressingMode::Immediate, Some(Operand::Immediate(0x01))));
    store_a_into(out, &ctx.regs.loc(result));
}

fn emit_compare(ctx: &mut FunctionCtx, instr: &Instruction, out: &mut AsmModule) {
    let (Some(lhs), Some(rhs)) = (instr.operands.first(), instr.operands.get(1)) else { return };
    let Some(result) = instr.result else { return };
    load_value_into_a(ctx, out, lhs, 0);
    let rhs_loc = ctx.value_loc(rhs);
    match (rhs_loc, rhs) {
        (_, Value::Constant(v, _)) => {
            out.push(AsmItem::instr("CMP", AddressingMode::Immediate, Some(Operand::Immediate((*v & 0xFF) as u8))).with_span(instr.span));
        }
        (Some(loc), _) => {
            let (mode, op) = loc.operand();
            out.push(AsmItem::instr("CMP", mode, Some(op)).with_span(instr.span));
        }
        _ => {}
    }

    let true_label = ctx.fresh_label("cmp_true");
    let end_label = ctx.fresh_label("cmp_end");
    let branch_mnemonic = match instr.opcode {
        Opcode::CmpEq => "BEQ",
        Opcode::CmpNe => "BNE",
        Opcode::CmpLt => "BCC",
        Opcode::CmpGe => "BCS",
        // Gt/Le need the extra equality check: carry-set-and-not-equal is
        // "greater"; equal-or-carry-clear is "less or equal".
        Opcode::CmpGt | Opcode::CmpLe => "BEQ",
        _ => unreachable!(),
    };

    match instr.opcode {
        Opcode::CmpGt => {
            out.push(AsmItem::instr("BEQ", AddressingMode::Relative, Some(Operand::Label(false_label(&end_label)))));
            out.push(AsmItem::instr("BCS", AddressingMode::Relative, Some(Operand::Label(true_label.clone()))));
            out.push(AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label(false_label(&end_label)))));
        }
        Opcode::CmpLe => {
            out.push(AsmItem::instr("BEQ", AddressingMode::Relative, Some(Operand::Label(true_label.clone()))));
            out.push(AsmItem::instr("BCC", AddressingMode::Relative, Some(Operand::Label(true_label.clone()))));
            out.push(AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label(false_label(&end_label)))));
        }
        _ => {
            out.push(AsmItem::instr(branch_mnemonic, AddressingMode::Relative, Some(Operand::Label(true_label.clone()))));
            out.push(AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label(false_label(&end_label)))));
        }
    }
    out.push(AsmItem::Label { name: false_label(&end_label), kind: LabelKind::Temp, span: None });
    out.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(Operand::Immediate(0))));
    out.push(AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label(end_label.clone()))));
    out.push(AsmItem::Label { name: true_label, kind: LabelKind::Temp, span: None });
    out.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(Operand::Immediate(1))));
    out.push(AsmItem::Label { name: end_label, kind: LabelKind::Temp, span: None });
    store_a_into(out, &ctx.regs.loc(result));
}

fn false_label(end_label: &str) -> String {
    format!("{end_label}_f")
}

fn emit_call(ctx: &mut FunctionCtx, instr: &Instruction, out: &mut AsmModule) {
    let Some(callee_name) = callee_name(instr) else { return };
    if let Some(callee) = ctx.module.function(callee_name) {
        for (arg, param) in instr.operands.iter().zip(callee.parameters.iter()) {
            let Some(dest) = ctx.sfa.placements.get(&param.slot.0).map(loc_from_placement) else { continue };
            let width = param.ty.width().max(1);
            load_value_into_a(ctx, out, arg, 0);
            store_a_into(out, &dest);
            if width >= 2 {
                load_value_into_a(ctx, out, arg, 1);
                store_a_into(out, &dest.plus(1));
            }
        }
    }
    out.push(AsmItem::instr("JSR", AddressingMode::Absolute, Some(Operand::Label(format!("_{}", sanitize(callee_name))))).with_span(instr.span));
    if instr.opcode == Opcode::Call {
        if let Some(result) = instr.result {
            let dest = ctx.regs.loc(result);
            let width = dest_width(ctx, result);
            store_a_into(out, &dest);
            if width >= 2 {
                out.push(AsmItem::instr("TXA", AddressingMode::Implied, None));
                store_a_into(out, &dest.plus(1));
            }
        }
    }
}

/// Base `(bytes, cycles)` for a subset of 6502 mnemonics this code
/// generator emits, keyed by addressing mode. Unknown combinations fall
/// back to a conservative `(1, None)` rather than panicking, since the
/// optimizer and emitter must keep working even for mnemonics this table
/// has not learned about yet.
pub fn instruction_size_and_cycles(mnemonic: &str, mode: AddressingMode) -> (u8, Option<u8>) {
    let bytes = match mode {
        AddressingMode::Implied | AddressingMode::Accumulator => 1,
        AddressingMode::Immediate => 2,
        AddressingMode::ZeroPage | AddressingMode::ZeroPageX | AddressingMode::ZeroPageY => 2,
        AddressingMode::IndirectX | AddressingMode::IndirectY => 2,
        AddressingMode::Relative => 2,
        AddressingMode::Absolute | AddressingMode::AbsoluteX | AddressingMode::AbsoluteY | AddressingMode::Indirect => 3,
    };
    let cycles = match (mnemonic, mode) {
        ("LDA" | "LDX" | "LDY" | "AND" | "ORA" | "EOR" | "ADC" | "SBC" | "CMP" | "CPX" | "CPY", AddressingMode::Immediate) => Some(2),
        ("LDA" | "LDX" | "LDY" | "AND" | "ORA" | "EOR" | "ADC" | "SBC" | "CMP" | "CPX" | "CPY" | "STA" | "STX" | "STY", AddressingMode::ZeroPage) => Some(3),
        (_, AddressingMode::ZeroPageX | AddressingMode::ZeroPageY) => Some(4),
        ("LDA" | "LDX" | "LDY" | "AND" | "ORA" | "EOR" | "ADC" | "SBC" | "CMP" | "CPX" | "CPY" | "STA" | "STX" | "STY", AddressingMode::Absolute) => Some(4),
        (_, AddressingMode::AbsoluteX | AddressingMode::AbsoluteY) => Some(4),
        ("ASL" | "LSR" | "ROL" | "ROR", AddressingMode::Accumulator) => Some(2),
        ("ASL" | "LSR" | "ROL" | "ROR", AddressingMode::ZeroPage) => Some(5),
        ("INC" | "DEC", AddressingMode::ZeroPage) => Some(5),
        ("TAX" | "TXA" | "TAY" | "TYA" | "INX" | "DEX" | "INY" | "DEY" | "CLC" | "SEC" | "NOP" | "PHA" | "PLA", _) => Some(2),
        ("RTS", _) => Some(6),
        ("JSR", _) => Some(6),
        ("JMP", AddressingMode::Absolute) => Some(3),
        ("JMP", AddressingMode::Indirect) => Some(5),
        ("BEQ" | "BNE" | "BCC" | "BCS" | "BMI" | "BPL" | "BVC" | "BVS", AddressingMode::Relative) => Some(2),
        _ => None,
    };
    (bytes, cycles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_ast::AstArenas;
    use blend65_base::Interner;
    use blend65_il::IlGenerator;
    use blend65_lexer::Lexer;
    use blend65_parser::Parser;
    use crate::target::Target;

    fn generate_il(source: &str) -> IlModule {
        let (tokens, _) = Lexer::new(source).tokenize();
        let arenas: &'static AstArenas<'static> = Box::leak(Box::new(AstArenas::new()));
        let interner: &'static mut Interner = Box::leak(Box::new(Interner::new()));
        let (program, _) = Parser::parse(tokens, interner, arenas);
        let analysis = blend65_sema::analyze_single("test", program.clone(), interner);
        let annotations = analysis.annotations_by_module.get("test").unwrap();
        let module_scope = *analysis.module_scopes.get("test").unwrap();
        let mut gen = IlGenerator::new(&analysis.symbols, &analysis.types, interner, annotations, "test");
        gen.generate(&program, module_scope).unwrap()
    }

    fn compile(source: &str) -> AsmModule {
        let module = generate_il(source);
        let cfg = TargetConfig::for_target(Target::C64).unwrap();
        let sfa = crate::sfa::allocate(&module, &cfg);
        generate(&module, &sfa, &cfg).module
    }

    fn instructions(asm: &AsmModule) -> Vec<(&'static str, AddressingMode, Option<&Operand>)> {
        asm.items
            .iter()
            .filter_map(|item| match item {
                AsmItem::Instruction { mnemonic, mode, operand, .. } => Some((*mnemonic, *mode, operand.as_ref())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn bitwise_not_on_a_byte_complements_every_bit() {
        let asm = compile("module test;\nfunction flip(x: byte): byte {\n return ~x;\n}\n");
        let items = instructions(&asm);
        let has_full_complement = items.iter().any(|(m, mode, op)| *m == "EOR" && *mode == AddressingMode::Immediate && matches!(op, Some(Operand::Immediate(0xFF))));
        let has_bit0_flip = items.iter().any(|(m, mode, op)| *m == "EOR" && *mode == AddressingMode::Immediate && matches!(op, Some(Operand::Immediate(0x01))));
        assert!(has_full_complement, "`~x` on a byte must emit EOR #$FF, got {items:?}");
        assert!(!has_bit0_flip, "`~x` must not emit the logical-not EOR #$01, got {items:?}");
    }

    #[test]
    fn bitwise_not_on_a_word_complements_both_bytes() {
        let asm = compile("module test;\nfunction flip(x: word): word {\n return ~x;\n}\n");
        let items = instructions(&asm);
        let full_complements = items.iter().filter(|(m, mode, op)| *m == "EOR" && *mode == AddressingMode::Immediate && matches!(op, Some(Operand::Immediate(0xFF)))).count();
        assert_eq!(full_complements, 2, "`~x` on a word must complement both the low and high byte, got {items:?}");
    }

    #[test]
    fn logical_not_on_a_bool_still_flips_only_bit_zero() {
        let asm = compile("module test;\nfunction negate(flag: bool): bool {\n return !flag;\n}\n");
        let items = instructions(&asm);
        let has_bit0_flip = items.iter().any(|(m, mode, op)| *m == "EOR" && *mode == AddressingMode::Immediate && matches!(op, Some(Operand::Immediate(0x01))));
        let has_full_complement = items.iter().any(|(m, mode, op)| *m == "EOR" && *mode == AddressingMode::Immediate && matches!(op, Some(Operand::Immediate(0xFF))));
        assert!(has_bit0_flip, "`!flag` must still emit EOR #$01, got {items:?}");
        assert!(!has_full_complement, "`!flag` must not emit a bitwise EOR #$FF, got {items:?}");
    }

    #[test]
    fn indexed_read_uses_x_indexed_addressing_not_the_base_slot() {
        let asm = compile("module test;\nlet a: byte[4] = [1, 2, 3, 4];\nfunction get(i: byte): byte {\n return a[i];\n}\n");
        let items = instructions(&asm);
        assert!(items.iter().any(|(m, ..)| *m == "TAX"), "offset must be loaded into X before an indexed load, got {items:?}");
        assert!(
            items.iter().any(|(m, mode, _)| *m == "LDA" && matches!(mode, AddressingMode::ZeroPageX | AddressingMode::AbsoluteX)),
            "`a[i]` must read with X-indexed addressing, got {items:?}"
        );
    }

    #[test]
    fn indexed_write_stores_the_assigned_value_not_the_offset() {
        let asm = compile("module test;\nlet a: byte[4] = [1, 2, 3, 4];\nfunction set(i: byte, v: byte): void {\n a[i] = v;\n}\n");
        let items = instructions(&asm);
        assert!(items.iter().any(|(m, ..)| *m == "TAX"), "offset must be loaded into X before an indexed store, got {items:?}");
        assert!(
            items.iter().any(|(m, mode, _)| *m == "STA" && matches!(mode, AddressingMode::ZeroPageX | AddressingMode::AbsoluteX)),
            "`a[i] = v` must store with X-indexed addressing, got {items:?}"
        );
        let loads_v = items.windows(2).any(|w| matches!(w, [("LDA", mode, _), ("STA", store_mode, _)] if !matches!(mode, AddressingMode::ZeroPageX | AddressingMode::AbsoluteX) && matches!(store_mode, AddressingMode::ZeroPageX | AddressingMode::AbsoluteX)));
        assert!(loads_v, "the stored byte must come from `v`'s own location, not the index offset, got {items:?}");
    }
}
