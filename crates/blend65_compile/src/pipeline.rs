//! Top-level pipeline wiring.
//!
//! `compile`/`compile_modules` run every phase in order — lex, parse,
//! analyze, generate IL, required lowering, SFA, codegen, optional
//! peephole passes, emit — and never invoke the Rust toolchain's panic
//! machinery for user-facing problems: every recoverable error becomes a
//! [`Diagnostic`] in the returned [`CompileResult`].

use crate::options::CompileOptions;
use blend65_ast::{AstArenas, Decl, Program};
use blend65_base::{Diagnostic, DiagnosticSink, Interner, Position, Severity, Span};
use blend65_codegen::{
    AdcIncPass, AsmItem, AsmModule, AsmPassManager, CodegenStats, DeadStoreEliminationPass, IlPassManager, IntrinsicLoweringPass, JmpChainCollapsePass, PassStat, RedundantLoadPass,
    TargetConfig, TaxTxaPairPass,
};
use blend65_emit::EmitOutput;
use blend65_il::{IlGenerator, IlModule};
use blend65_lexer::Lexer;
use blend65_parser::Parser;
use blend65_sema::module::DependencyGraph;
use blend65_sema::{analyze, ModuleInput};

/// One named source file handed to [`compile_modules`]; `name` is the
/// logical module name other units' `import ... from <name>;` refer to.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub name: String,
    pub source: String,
}

impl CompilationUnit {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), source: source.into() }
    }
}

/// Everything one compilation produced: diagnostics (always present,
/// possibly empty) plus the pipeline's output once every phase up to the
/// one that failed has run. `asm_text`/`emit`/`codegen_stats` are `None`
/// only when a phase-ending error stopped compilation before codegen —
/// the target failed to resolve, or semantic analysis (including the
/// recursion checker) produced at least one error.
#[derive(Debug, Default)]
pub struct CompileResult {
    pub diagnostics: Vec<Diagnostic>,
    pub codegen_stats: Option<CodegenStats>,
    pub emit: Option<EmitOutput>,
    pub asm_text: Option<String>,
    pub vice_labels: Option<String>,
    pub pass_stats: Vec<PassStat>,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics, ..Self::default() }
    }
}

fn synthetic_span() -> Span {
    Span::point(Position::START)
}

/// Convenience entry point for a single in-memory source buffer with no
/// imports.
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult {
    compile_modules(&[CompilationUnit::new("main", source)], options)
}

/// Compiles a set of named source units into one ACME text program. Units
/// may `import` from one another; compilation order follows the
/// reverse-topological order of their import graph, and so does the
/// concatenation of their lex/parse diagnostics.
pub fn compile_modules(units: &[CompilationUnit], options: &CompileOptions) -> CompileResult {
    let _span = tracing::info_span!("compile_modules", units = units.len(), target = %options.target).entered();
    let mut diagnostics = Vec::new();

    let target = match TargetConfig::for_target(options.target) {
        Ok(t) => t,
        Err(_) => {
            diagnostics.push(Diagnostic::error("S150", format!("target `{}` is not implemented", options.target), synthetic_span()));
            return CompileResult::failed(diagnostics);
        }
    };

    if !options.optimization_level.is_implemented() {
        diagnostics.push(Diagnostic::warning(
            "W100",
            format!("optimization level {:?} is not implemented; compiling as O0", options.optimization_level),
            synthetic_span(),
        ));
    }

    // One interner shared across every unit so cross-module symbol names
    // compare equal; one fresh arena per unit, matching the workspace's
    // established `Box::leak` convention for building `'static` AST
    // trees outside a single-function test (see `blend65_sema`/`blend65_il`
    // unit tests) — a whole-process compile is exactly that convention's
    // production-path use.
    let interner: &'static mut Interner = Box::leak(Box::new(Interner::new()));

    struct Parsed {
        name: String,
        program: Program<'static>,
        lex: DiagnosticSink,
        parse: DiagnosticSink,
    }

    let mut parsed: Vec<Parsed> = Vec::with_capacity(units.len());
    for unit in units {
        let (tokens, lex) = Lexer::new(&unit.source).tokenize();
        let arenas: &'static AstArenas<'static> = Box::leak(Box::new(AstArenas::new()));
        let (program, parse) = Parser::parse(tokens, &mut *interner, arenas);
        parsed.push(Parsed { name: unit.name.clone(), program, lex, parse });
    }

    let mut dep_graph = DependencyGraph::new();
    for p in &parsed {
        dep_graph.add_module(&p.name);
        for decl in p.program.decls {
            if let Decl::Import { source_module_text, span, .. } = decl {
                dep_graph.add_import(&p.name, source_module_text.clone(), *span);
            }
        }
    }
    let order: Vec<String> = dep_graph.compilation_order().unwrap_or_else(|| parsed.iter().map(|p| p.name.clone()).collect());

    // Overall diagnostic output is the concatenation of per-file sequences
    // in dependency-topological order. Semantic diagnostics already come
    // back from `analyze` in that order; lex and parse diagnostics are
    // folded in here, ahead of them, in the same order.
    for name in &order {
        if let Some(p) = parsed.iter().find(|p| &p.name == name) {
            diagnostics.extend(p.lex.iter().cloned());
            diagnostics.extend(p.parse.iter().cloned());
        }
    }

    let module_inputs: Vec<ModuleInput<'static>> = parsed.iter().map(|p| ModuleInput { name: p.name.clone(), program: p.program.clone() }).collect();
    let analysis = analyze(&module_inputs, interner);
    diagnostics.extend(analysis.diagnostics.iter().cloned());

    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        tracing::debug!(error_count = diagnostics.iter().filter(|d| d.severity == Severity::Error).count(), "compilation stopped before codegen");
        return CompileResult::failed(diagnostics);
    }

    let mut merged = IlModule::new(units.first().map(|u| u.name.clone()).unwrap_or_else(|| "program".to_string()));
    for name in &order {
        let (Some(&scope), Some(annotations), Some(p)) = (analysis.module_scopes.get(name), analysis.annotations_by_module.get(name), parsed.iter().find(|p| &p.name == name)) else {
            continue;
        };
        let mut generator = IlGenerator::new(&analysis.symbols, &analysis.types, &*interner, annotations, name.clone());
        match generator.generate(&p.program, scope) {
            Ok(module) => {
                merged.globals.extend(module.globals);
                merged.functions.extend(module.functions);
                if merged.entry_point.is_none() {
                    merged.entry_point = module.entry_point;
                }
            }
            Err(err) => {
                diagnostics.push(Diagnostic::error("S199", format!("internal error generating IL for `{name}`: {err}"), synthetic_span()));
                return CompileResult::failed(diagnostics);
            }
        }
    }

    // Required lowering.
    let mut il_passes = IlPassManager::new(8);
    il_passes.add(Box::new(IntrinsicLoweringPass));
    let mut pass_stats = il_passes.run(&mut merged);

    let sfa = blend65_codegen::allocate(&merged, &target);
    diagnostics.extend(sfa.diagnostics.iter().cloned());

    // `load_address` overrides the target's default origin; the
    // BASIC stub (if requested) is then spliced in front of that origin.
    let mut target_for_codegen = target.clone();
    target_for_codegen.default_load_address = options.load_address;

    let codegen_output = blend65_codegen::generate(&merged, &sfa, &target_for_codegen);
    diagnostics.extend(codegen_output.diagnostics.iter().cloned());

    let mut asm_module = codegen_output.module;

    if options.optimization_level.runs_peepholes() && options.optimization_level.is_implemented() {
        let mut asm_passes = AsmPassManager::new(8);
        asm_passes.add(Box::new(RedundantLoadPass));
        asm_passes.add(Box::new(DeadStoreEliminationPass));
        asm_passes.add(Box::new(JmpChainCollapsePass));
        asm_passes.add(Box::new(TaxTxaPairPass));
        asm_passes.add(Box::new(AdcIncPass));
        pass_stats.extend(asm_passes.run(&mut asm_module));
    }

    if options.basic_stub {
        if let Some(AsmItem::Origin(ml_start)) = asm_module.items.first().cloned() {
            let stub_items = blend65_emit::basic_stub::emit(ml_start);
            asm_module.items.splice(0..1, stub_items);
        }
    }

    // Inline source comments only make
    // unambiguous sense against a single source buffer: a merged
    // multi-module program's instruction spans each refer to a different
    // unit's own text, and `Span` carries no file id to disambiguate.
    // Single-file compiles get full inline annotation.
    if options.debug.wants_inline() {
        if let [unit] = units {
            attach_inline_source_comments(&mut asm_module, &unit.source);
        }
    }

    let vice_labels = if options.debug.wants_vice() { Some(blend65_emit::vice_label_file(&asm_module)) } else { None };

    // `prg`/`both` still only produce `asm` text from this core; `options.output_format` only documents what the
    // host intends to do with the text this function returns.
    let mut emitter_config = blend65_emit::EmitterConfig::default();
    if options.debug.wants_inline() {
        emitter_config.include_comments = true;
    }

    let emit_output = blend65_emit::emit(&asm_module, &emitter_config);
    let asm_text = emit_output.text.clone();

    CompileResult {
        diagnostics,
        codegen_stats: Some(codegen_output.stats),
        emit: Some(emit_output),
        asm_text: Some(asm_text),
        vice_labels,
        pass_stats,
    }
}

fn attach_inline_source_comments(asm: &mut AsmModule, source: &str) {
    let lines: Vec<&str> = source.lines().collect();
    for item in &mut asm.items {
        if let AsmItem::Instruction { span: Some(span), comment, .. } = item {
            if comment.is_none() {
                if let Some(text) = lines.get((span.start.line as usize).saturating_sub(1)) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        *comment = Some(trimmed.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DebugMode, OptLevel};

    #[test]
    fn empty_module_compiles_with_no_diagnostics() {
        let result = compile("module test;", &CompileOptions::default());
        assert!(!result.has_errors());
        let asm = result.asm_text.expect("asm text produced");
        assert!(asm.contains("*= $0801"));
    }

    #[test]
    fn single_assignment_emits_lda_immediate() {
        let result = compile("module test;\nlet x: byte = 42;\n", &CompileOptions::default());
        assert!(!result.has_errors());
        let asm = result.asm_text.unwrap();
        assert!(asm.contains("LDA #$2A"));
    }

    #[test]
    fn target_not_implemented_is_reported_without_codegen() {
        let options = CompileOptions { target: blend65_codegen::Target::C128, ..CompileOptions::default() };
        let result = compile("module test;", &options);
        assert!(result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.code == "S150"));
        assert!(result.asm_text.is_none());
    }

    #[test]
    fn unimplemented_optimization_level_warns_and_still_compiles() {
        let options = CompileOptions { optimization_level: OptLevel::O2, ..CompileOptions::default() };
        let result = compile("module test;\nlet x: byte = 1;\n", &options);
        assert!(result.diagnostics.iter().any(|d| d.code == "W100"));
        assert!(result.asm_text.is_some());
    }

    #[test]
    fn recursion_is_a_hard_error_that_blocks_codegen() {
        let result = compile("module test;\nfunction f(): void { f(); }", &CompileOptions::default());
        assert!(result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.code == "S020"));
        assert!(result.asm_text.is_none());
    }

    #[test]
    fn basic_stub_prepends_sys_line() {
        let options = CompileOptions { basic_stub: true, ..CompileOptions::default() };
        let result = compile("module test;\nfunction main(): void {\n return;\n}\n", &options);
        assert!(!result.has_errors());
        let asm = result.asm_text.unwrap();
        assert!(asm.contains("*= $0801"));
        assert!(asm.contains("!byte"));
    }

    #[test]
    fn vice_debug_mode_produces_a_label_list() {
        let options = CompileOptions { debug: DebugMode::Vice, ..CompileOptions::default() };
        let result = compile("module test;\nfunction main(): void {\n return;\n}\n", &options);
        let labels = result.vice_labels.expect("vice labels requested");
        assert!(labels.contains("al "));
    }

    #[test]
    fn circular_import_across_two_units_is_reported() {
        let units = vec![
            CompilationUnit::new("A", "module A;\nimport x from B;"),
            CompilationUnit::new("B", "module B;\nimport y from A;"),
        ];
        let result = compile_modules(&units, &CompileOptions::default());
        assert!(result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.code == "P106"));
    }

    #[test]
    fn zero_page_overflow_spills_to_ram_with_a_warning_and_still_compiles() {
        let mut src = String::from("module test;\n");
        for i in 0..150 {
            src.push_str(&format!("let g{i}: byte = {};\n", i % 250));
        }
        let result = compile(&src, &CompileOptions::default());
        assert!(!result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.code == "S100"));
    }
}
