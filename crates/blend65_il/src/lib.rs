//! # blend65_il
//!
//! Typed SSA-ish three-address IL and the AST-to-IL
//! generator that lowers a type-checked [`blend65_ast::Program`] into it.

pub mod block;
pub mod error;
pub mod function;
pub mod gen;
pub mod instr;
pub mod module;
pub mod value;

pub use block::BasicBlock;
pub use error::InternalError;
pub use function::{IlFunction, Parameter};
pub use gen::IlGenerator;
pub use instr::{ExtraOperand, Instruction, InstrId, MemSlot, Opcode};
pub use module::{Global, IlModule};
pub use value::{BlockId, RegisterId, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_ast::AstArenas;
    use blend65_base::Interner;
    use blend65_lexer::Lexer;
    use blend65_parser::Parser;

    fn generate_one(source: &str) -> IlModule {
        let (tokens, _) = Lexer::new(source).tokenize();
        let arenas: &'static AstArenas<'static> = Box::leak(Box::new(AstArenas::new()));
        let interner: &'static mut Interner = Box::leak(Box::new(Interner::new()));
        let (program, diags) = Parser::parse(tokens, interner, arenas);
        assert!(!diags.has_errors(), "unexpected parse diagnostics: {:?}", diags.iter().collect::<Vec<_>>());
        let analysis = blend65_sema::analyze_single("test", program.clone(), interner);
        assert!(!analysis.diagnostics.has_errors(), "unexpected diagnostics: {:?}", analysis.diagnostics.iter().collect::<Vec<_>>());
        let annotations = analysis.annotations_by_module.get("test").expect("module was analyzed");
        let module_scope = *analysis.module_scopes.get("test").expect("module scope recorded");
        let mut gen = IlGenerator::new(&analysis.symbols, &analysis.types, interner, annotations, "test");
        gen.generate(&program, module_scope).expect("generation succeeds on a type-checked program")
    }

    #[test]
    fn simple_assignment_lowers_to_const_and_store() {
        let module = generate_one("module test;\nlet x: byte = 42;\n");
        assert_eq!(module.globals.len(), 1);
        assert_eq!(module.globals[0].init, Some(42));
        assert_eq!(module.globals[0].slot.0, "test.x");
    }

    #[test]
    fn function_with_return_is_well_formed() {
        let module = generate_one("module test;\nfunction add(a: byte, b: byte): byte {\n  return a + b;\n}\n");
        let func = module.function("test.add").expect("function generated");
        assert!(func.is_well_formed());
        assert!(module.is_well_formed());
    }

    #[test]
    fn if_else_merges_into_one_block() {
        let module = generate_one("module test;\nfunction pick(flag: bool): byte {\n  if (flag) {\n    return 1;\n  } else {\n    return 2;\n  }\n}\n");
        let func = module.function("test.pick").expect("function generated");
        assert!(func.is_well_formed());
    }

    #[test]
    fn while_loop_generates_header_and_post_blocks() {
        let module = generate_one("module test;\nfunction count(): void {\n  let i: byte = 0;\n  while (i < 10) {\n    i = i + 1;\n  }\n}\n");
        let func = module.function("test.count").expect("function generated");
        assert!(func.is_well_formed());
        assert!(func.blocks.len() >= 3);
    }

    #[test]
    fn peek_poke_lower_to_hw_instructions() {
        let module = generate_one("module test;\nfunction blit(): void {\n  poke(53280, peek(53281));\n}\n");
        let func = module.function("test.blit").expect("function generated");
        let has_hw_read = func.blocks.iter().flat_map(|b| &b.instructions).any(|i| i.opcode == Opcode::HwRead);
        let has_hw_write = func.blocks.iter().flat_map(|b| &b.instructions).any(|i| i.opcode == Opcode::HwWrite);
        assert!(has_hw_read);
        assert!(has_hw_write);
    }

    #[test]
    fn short_circuit_and_introduces_a_phi() {
        let module = generate_one("module test;\nfunction both(a: bool, b: bool): bool {\n  return a && b;\n}\n");
        let func = module.function("test.both").expect("function generated");
        let has_phi = func.blocks.iter().flat_map(|b| &b.instructions).any(|i| i.opcode == Opcode::Phi);
        assert!(has_phi);
    }
}
