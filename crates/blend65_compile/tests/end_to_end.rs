//! End-to-end scenarios exercising the full pipeline through
//! [`blend65_compile::compile`]/[`compile_modules`].

use blend65_compile::{compile, compile_modules, CompilationUnit, CompileOptions, DebugMode};
use pretty_assertions::assert_eq;

fn compiles_clean(source: &str) -> String {
    let result = compile(source, &CompileOptions::default());
    assert!(!result.has_errors(), "unexpected diagnostics: {:?}", result.diagnostics);
    result.asm_text.expect("asm text")
}

#[test]
fn empty_module_produces_just_the_origin_and_halt_loop() {
    let asm = compiles_clean("module test;");
    assert!(asm.contains("*= $0801"));
    assert!(asm.contains("JMP .halt"));
}

#[test]
fn global_assignment_lowers_to_lda_sta() {
    let asm = compiles_clean("module test;\nlet x: byte = 42;");
    assert!(asm.contains("LDA #$2A"));
    assert!(asm.contains("STA"));
}

#[test]
fn conditional_compiles_and_branches() {
    let source = "module test;\nfunction main(): void {\n let x: byte = 1;\n if x == 1 {\n  let y: byte = 2;\n } else {\n  let y: byte = 3;\n }\n}";
    let asm = compiles_clean(source);
    assert!(asm.contains("_test_main"));
}

#[test]
fn direct_recursion_is_rejected_before_codegen() {
    let result = compile("module test;\nfunction f(): void { f(); }", &CompileOptions::default());
    assert!(result.has_errors());
    assert!(result.diagnostics.iter().any(|d| d.code == "S020"));
    assert!(result.asm_text.is_none());
}

#[test]
fn circular_import_across_modules_is_rejected() {
    let units = vec![CompilationUnit::new("A", "module A;\nimport x from B;"), CompilationUnit::new("B", "module B;\nimport y from A;")];
    let result = compile_modules(&units, &CompileOptions::default());
    assert!(result.has_errors());
    assert!(result.diagnostics.iter().any(|d| d.code == "P106"));
    assert!(result.asm_text.is_none());
}

#[test]
fn zero_page_overflow_spills_to_ram_without_blocking_codegen() {
    let mut source = String::from("module test;\n");
    for i in 0..150 {
        source.push_str(&format!("let g{i}: byte = {};\n", i % 250));
    }
    let result = compile(&source, &CompileOptions::default());
    assert!(!result.has_errors());
    assert!(result.diagnostics.iter().any(|d| d.code == "S100"));
    assert!(result.asm_text.is_some());
}

#[test]
fn two_module_program_compiles_with_import_resolved() {
    let units = vec![
        CompilationUnit::new("util", "module util;\nexport let limit: byte = 10;"),
        CompilationUnit::new("main", "module main;\nimport limit from util;\nfunction main(): void {\n let x: byte = limit;\n}"),
    ];
    let result = compile_modules(&units, &CompileOptions::default());
    assert!(!result.has_errors(), "unexpected diagnostics: {:?}", result.diagnostics);
    assert!(result.asm_text.unwrap().contains("_main_main"));
}

#[test]
fn basic_stub_option_prepends_a_sys_line_before_the_load_address() {
    let options = CompileOptions { basic_stub: true, ..CompileOptions::default() };
    let result = compile("module test;\nfunction main(): void {\n return;\n}\n", &options);
    assert!(!result.has_errors());
    let asm = result.asm_text.unwrap();
    let basic_pos = asm.find("*= $0801").expect("basic stub origin");
    let program_pos = asm.rfind("*= $0801").expect("program origin repeated after load_address default");
    assert!(basic_pos <= program_pos);
    assert!(asm.contains("!byte"));
}

#[test]
fn vice_debug_mode_returns_a_label_list_alongside_the_asm() {
    let options = CompileOptions { debug: DebugMode::Vice, ..CompileOptions::default() };
    let result = compile("module test;\nfunction main(): void {\n return;\n}\n", &options);
    assert!(!result.has_errors());
    let labels = result.vice_labels.expect("vice label list requested");
    assert!(labels.contains("al "));
    assert!(labels.contains(".main"));
}

#[test]
fn inline_debug_mode_attaches_source_text_as_instruction_comments() {
    let options = CompileOptions { debug: DebugMode::Inline, ..CompileOptions::default() };
    let result = compile("module test;\nfunction main(): void {\n let x: byte = 7;\n}\n", &options);
    assert!(!result.has_errors());
    let asm = result.asm_text.unwrap();
    assert!(asm.contains("let x: byte = 7;"));
}

#[test]
fn load_address_option_overrides_the_default_origin() {
    let options = CompileOptions { load_address: 0xC000, ..CompileOptions::default() };
    let result = compile("module test;", &options);
    assert!(!result.has_errors());
    assert!(result.asm_text.unwrap().contains("*= $C000"));
}
