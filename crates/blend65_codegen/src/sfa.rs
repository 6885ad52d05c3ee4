//! The Static Frame Allocator (SFA) and zero-page allocator.
//!
//! The language forbids recursion, so every function has at most one live
//! frame at a time: every local and parameter can live at a fixed
//! absolute address decided once, at compile time, instead of a
//! push/pop'd stack frame. This module assigns those addresses.
//!
//! Algorithm:
//! 1. Collect every function's parameters and locals with their widths,
//!    scanning the IL rather than re-deriving scope information, since
//!    `IlFunction::parameters` already carries resolved types and every
//!    local is discoverable from its first `STORE_MEM`.
//! 2. Build the "conflict" graph: two functions conflict (cannot share
//!    memory) iff a call-graph path exists from one to the other in
//!    either direction — that's exactly the condition under which both
//!    could be mid-call simultaneously. Recursion having already been
//!    rejected, this graph's transitive closure is a DAG, so
//!    the computation terminates.
//! 3. Greedily color the conflict graph; functions sharing a color never
//!    conflict and may reuse the same physical bytes (a "frame class").
//! 4. Rank frame classes by a simple hotness score (reference count,
//!    weighted up for references inside a loop) and place them into the
//!    target's safe zero-page range until the budget is exhausted.
//! 5. Everything else is placed in general RAM as a named, class-shared
//!    reservation; the emitter turns each reservation into a `!fill`
//!    [`crate::asmil::DataPayload`] and ACME resolves its final address
//!    at assembly time, the same way it resolves any other assembler
//!    label.

use crate::target::TargetConfig;
use blend65_base::{Diagnostic, DiagnosticSink, Span};
use blend65_il::{BlockId, IlFunction, IlModule, Instruction, Opcode};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    ZeroPage(u8),
    Ram { label: String, offset: u16 },
}

#[derive(Debug, Clone)]
pub struct RamReservation {
    pub label: String,
    pub size_bytes: u32,
}

#[derive(Debug, Default)]
pub struct SfaOutput {
    /// Resolved placement for every global and every function-local
    /// `MemSlot` name in the module.
    pub placements: FxHashMap<String, Placement>,
    pub zp_bytes_used: u32,
    pub ram_reservations: Vec<RamReservation>,
    pub diagnostics: DiagnosticSink,
}

struct SlotInfo {
    name: String,
    width: u32,
    first_span: Option<Span>,
}

/// One function's footprint: its own locals/parameters, packed
/// sequentially in declaration order.
struct FunctionFrame {
    function: String,
    slots: Vec<SlotInfo>,
    size: u32,
    hot_score: u64,
}

impl FunctionFrame {
    fn build(func: &IlFunction, hot_blocks: &FxHashSet<BlockId>) -> FunctionFrame {
        let mut slots = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        for p in &func.parameters {
            seen.insert(p.slot.0.clone());
            slots.push(SlotInfo { name: p.slot.0.clone(), width: p.ty.width().max(1), first_span: None });
        }
        for block in &func.blocks {
            for instr in &block.instructions {
                if let Opcode::StoreMem = instr.opcode {
                    let Some(slot_name) = mem_slot_of(instr) else { continue };
                    if !is_local_of(&func.name, &slot_name) || seen.contains(&slot_name) {
                        continue;
                    }
                    seen.insert(slot_name.clone());
                    let width = instr.operands.first().and_then(|v| v.ty()).map(|t| t.width().max(1)).unwrap_or(1);
                    slots.push(SlotInfo { name: slot_name, width, first_span: instr.span });
                }
            }
        }
        let size: u32 = slots.iter().map(|s| s.width).sum();
        let hot_score = hotness_score(func, hot_blocks, &seen);
        FunctionFrame { function: func.name.clone(), slots, size, hot_score }
    }
}

fn mem_slot_of(instr: &Instruction) -> Option<String> {
    instr.extra.iter().find_map(|e| match e {
        blend65_il::ExtraOperand::Mem(m) => Some(m.0.clone()),
        _ => None,
    })
}

/// A local/parameter slot is named `module.function.var`; a global is
/// `module.var`. Three dot-separated segments distinguish the former.
fn is_local_of(function_qualified_name: &str, slot: &str) -> bool {
    slot.starts_with(function_qualified_name) && slot.len() > function_qualified_name.len() && slot.as_bytes()[function_qualified_name.len()] == b'.'
}

/// References inside a block that is part of any cycle in the function's
/// block graph count quadruple.
fn hotness_score(func: &IlFunction, hot_blocks: &FxHashSet<BlockId>, slots: &FxHashSet<String>) -> u64 {
    let mut score = 0u64;
    for block in &func.blocks {
        let weight: u64 = if hot_blocks.contains(&block.id) { 4 } else { 1 };
        for instr in &block.instructions {
            if matches!(instr.opcode, Opcode::LoadMem | Opcode::StoreMem) {
                if let Some(slot) = mem_slot_of(instr) {
                    if slots.contains(&slot) {
                        score += weight;
                    }
                }
            }
        }
    }
    score
}

/// Blocks that lie on some cycle of the function's own control-flow graph
/// (i.e. a loop body/header), found by a direct reachability check rather
/// than full SCC machinery — functions here are small enough that O(V^2)
/// is fine.
fn find_hot_blocks(func: &IlFunction) -> FxHashSet<BlockId> {
    let mut hot = FxHashSet::default();
    for block in &func.blocks {
        if can_reach(func, &block.successors, block.id, &mut FxHashSet::default()) {
            hot.insert(block.id);
        }
    }
    hot
}

fn can_reach(func: &IlFunction, frontier: &[BlockId], target: BlockId, visited: &mut FxHashSet<BlockId>) -> bool {
    let mut stack: Vec<BlockId> = frontier.to_vec();
    while let Some(b) = stack.pop() {
        if b == target {
            return true;
        }
        if !visited.insert(b) {
            continue;
        }
        stack.extend(func.block(b).successors.iter().copied());
    }
    false
}

/// Rebuilds a lightweight call graph straight from `CALL`/`CALL_VOID`
/// instructions' callee operand, so the allocator stays self-contained
/// and does not need a `blend65_sema` dependency (the IL already records
/// everything the conflict graph needs).
fn call_edges(module: &IlModule) -> FxHashMap<String, Vec<String>> {
    let mut edges: FxHashMap<String, Vec<String>> = FxHashMap::default();
    for func in &module.functions {
        let entry = edges.entry(func.name.clone()).or_default();
        for block in &func.blocks {
            for instr in &block.instructions {
                if matches!(instr.opcode, Opcode::Call | Opcode::CallVoid) {
                    for extra in &instr.extra {
                        if let blend65_il::ExtraOperand::Callee(callee) = extra {
                            entry.push(callee.clone());
                        }
                    }
                }
            }
        }
    }
    edges
}

fn reachable_from(start: &str, edges: &FxHashMap<String, Vec<String>>) -> FxHashSet<String> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![start.to_string()];
    while let Some(f) = stack.pop() {
        for callee in edges.get(&f).into_iter().flatten() {
            if seen.insert(callee.clone()) {
                stack.push(callee.clone());
            }
        }
    }
    seen
}

/// Greedy graph coloring: functions sharing a color never conflict.
/// Functions are processed in a deterministic (sorted) order so
/// allocation is reproducible across runs.
fn color_functions(functions: &[String], conflicts: &FxHashMap<String, FxHashSet<String>>) -> FxHashMap<String, usize> {
    let mut sorted = functions.to_vec();
    sorted.sort();
    let mut colors: FxHashMap<String, usize> = FxHashMap::default();
    for f in &sorted {
        let used: FxHashSet<usize> = conflicts.get(f).into_iter().flatten().filter_map(|g| colors.get(g).copied()).collect();
        let mut c = 0;
        while used.contains(&c) {
            c += 1;
        }
        colors.insert(f.clone(), c);
    }
    colors
}

pub fn allocate(module: &IlModule, target: &TargetConfig) -> SfaOutput {
    let mut out = SfaOutput::default();

    // Globals are never frame-shared: they persist for the whole program.
    let mut global_candidates: Vec<(String, u32, u64, Option<Span>)> = Vec::new();
    for g in &module.globals {
        global_candidates.push((g.slot.0.clone(), g.ty.width().max(1), 0, None));
    }

    let hot_blocks_by_fn: FxHashMap<String, FxHashSet<BlockId>> = module.functions.iter().map(|f| (f.name.clone(), find_hot_blocks(f))).collect();
    let frames: Vec<FunctionFrame> = module.functions.iter().map(|f| FunctionFrame::build(f, &hot_blocks_by_fn[&f.name])).collect();

    let edges = call_edges(module);
    let reach: FxHashMap<String, FxHashSet<String>> = module.functions.iter().map(|f| (f.name.clone(), reachable_from(&f.name, &edges))).collect();
    let names: Vec<String> = module.functions.iter().map(|f| f.name.clone()).collect();
    let mut conflicts: FxHashMap<String, FxHashSet<String>> = names.iter().map(|n| (n.clone(), FxHashSet::default())).collect();
    for a in &names {
        for b in &names {
            if a == b {
                continue;
            }
            if reach[a].contains(b) || reach[b].contains(a) {
                conflicts.get_mut(a).unwrap().insert(b.clone());
            }
        }
    }
    let colors = color_functions(&names, &conflicts);

    // Group function frames by color into shared frame classes.
    let mut by_color: FxHashMap<usize, Vec<&FunctionFrame>> = FxHashMap::default();
    for frame in &frames {
        if frame.size == 0 {
            continue;
        }
        by_color.entry(colors[&frame.function]).or_default().push(frame);
    }

    struct FrameClass<'a> {
        color: usize,
        size: u32,
        hotness: u64,
        members: Vec<&'a FunctionFrame>,
    }
    let mut classes: Vec<FrameClass> = by_color
        .into_iter()
        .map(|(color, members)| {
            let size = members.iter().map(|m| m.size).max().unwrap_or(0);
            let hotness = members.iter().map(|m| m.hot_score).sum();
            FrameClass { color, size, hotness, members }
        })
        .collect();
    // Deterministic, hottest-and-smallest-first placement order.
    classes.sort_by(|a, b| b.hotness.cmp(&a.hotness).then(a.size.cmp(&b.size)).then(a.color.cmp(&b.color)));

    // Globals also compete for zero page, ranked alongside frame classes
    // by the same hotness/size rule; globals have no computed hotness
    // (no loop-nesting concept at module scope) so they rank after any
    // referenced local but before an unreferenced one.
    let mut zp_cursor: u32 = *target.zero_page.safe_range.start() as u32;
    let zp_end: u32 = *target.zero_page.safe_range.end() as u32;

    for (slot, width, hotness, span) in &global_candidates {
        let _ = hotness;
        if *width > 0 && zp_cursor + width - 1 <= zp_end {
            out.placements.insert(slot.clone(), Placement::ZeroPage(zp_cursor as u8));
            zp_cursor += width;
        } else {
            let label = format!("_g_{}", sanitize(slot));
            out.placements.insert(slot.clone(), Placement::Ram { label: label.clone(), offset: 0 });
            out.ram_reservations.push(RamReservation { label, size_bytes: *width });
            out.diagnostics.push(Diagnostic::warning(
                "S100",
                format!("zero-page budget exhausted; global `{slot}` was placed in general RAM"),
                span.unwrap_or_default(),
            ));
        }
    }

    for class in &classes {
        if zp_cursor + class.size <= zp_end + 1 {
            let base = zp_cursor;
            for member in &class.members {
                let mut offset = 0u32;
                for slot in &member.slots {
                    out.placements.insert(slot.name.clone(), Placement::ZeroPage((base + offset) as u8));
                    offset += slot.width;
                }
            }
            zp_cursor += class.size;
        } else {
            let label = format!("_frame{}", class.color);
            for member in &class.members {
                let mut offset = 0u32;
                for slot in &member.slots {
                    out.placements.insert(slot.name.clone(), Placement::Ram { label: label.clone(), offset: offset as u16 });
                    offset += slot.width;
                }
            }
            out.ram_reservations.push(RamReservation { label, size_bytes: class.size });
            let overflowing_var = class.members.first().and_then(|m| m.slots.first());
            let (name, span) = overflowing_var.map(|s| (s.name.clone(), s.first_span)).unwrap_or_default();
            out.diagnostics.push(Diagnostic::warning(
                "S100",
                format!("zero-page budget exhausted; `{name}` and the rest of its frame were placed in general RAM"),
                span.unwrap_or_default(),
            ));
        }
    }

    out.zp_bytes_used = zp_cursor - *target.zero_page.safe_range.start() as u32;
    tracing::debug!(
        zp_bytes_used = out.zp_bytes_used,
        zp_budget = target.zero_page.usable_bytes(),
        ram_reservations = out.ram_reservations.len(),
        "static frame allocation complete"
    );
    for r in &out.ram_reservations {
        tracing::trace!(label = %r.label, size_bytes = r.size_bytes, "frame class spilled to RAM");
    }
    out
}

fn sanitize(slot: &str) -> String {
    slot.replace('.', "_")
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

    fn generate(source: &str) -> IlModule {
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

    #[test]
    fn globals_get_distinct_zero_page_addresses() {
        let module = generate("module test;\nlet x: byte = 1;\nlet y: byte = 2;\n");
        let cfg = TargetConfig::for_target(Target::C64).unwrap();
        let out = allocate(&module, &cfg);
        let Some(Placement::ZeroPage(a)) = out.placements.get("test.x") else { panic!("x not placed in zp") };
        let Some(Placement::ZeroPage(b)) = out.placements.get("test.y") else { panic!("y not placed in zp") };
        assert_ne!(a, b);
    }

    #[test]
    fn non_colive_functions_can_share_a_frame_class() {
        let module = generate("module test;\nfunction a(): void {\n let v: byte = 1;\n}\nfunction b(): void {\n let w: byte = 2;\n}\nfunction main(): void {\n}\n");
        let cfg = TargetConfig::for_target(Target::C64).unwrap();
        let out = allocate(&module, &cfg);
        let Some(Placement::ZeroPage(a)) = out.placements.get("test.a.v") else { panic!() };
        let Some(Placement::ZeroPage(b)) = out.placements.get("test.b.w") else { panic!() };
        assert_eq!(a, b, "a and b never co-call each other, so their locals should share one byte");
    }

    #[test]
    fn caller_and_callee_locals_never_share_an_address() {
        let module = generate("module test;\nfunction callee(): byte {\n let v: byte = 1;\n return v;\n}\nfunction caller(): void {\n let w: byte = callee();\n}\n");
        let cfg = TargetConfig::for_target(Target::C64).unwrap();
        let out = allocate(&module, &cfg);
        let Some(v) = out.placements.get("test.callee.v") else { panic!() };
        let Some(w) = out.placements.get("test.caller.w") else { panic!() };
        assert_ne!(v, w);
    }

    #[test]
    fn overflowing_zero_page_budget_spills_to_ram_with_a_warning() {
        let mut src = String::from("module test;\n");
        for i in 0..160 {
            src.push_str(&format!("let g{i}: byte = 1;\n"));
        }
        let module = generate(&src);
        let cfg = TargetConfig::for_target(Target::C64).unwrap();
        let out = allocate(&module, &cfg);
        assert!(out.ram_reservations.iter().any(|r| r.label.starts_with("_g_")));
    }
}
