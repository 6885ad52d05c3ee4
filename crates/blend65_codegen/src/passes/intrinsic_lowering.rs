//! Required intrinsic-lowering pass: after this pass, no `peek`/`poke`
//! call nodes remain; they are replaced by `HW_READ`/`HW_WRITE`
//! instructions.
//!
//! [`blend65_il::IlGenerator`] already lowers `peek`/`poke` directly while
//! walking the AST (see its `generate_intrinsic`), so on the normal
//! generator-to-optimizer pipeline this pass finds nothing left to do. It
//! stays a real, independently-useful pass rather than a stub so that an
//! `IlModule` built by hand (a test fixture, or a future front end that
//! skips early lowering) still gets a codegen-ready module out of the
//! pass manager.

use crate::pass::IlPass;
use blend65_il::{ExtraOperand, IlModule, Opcode};

pub struct IntrinsicLoweringPass;

impl IlPass for IntrinsicLoweringPass {
    fn name(&self) -> &'static str {
        "intrinsic-lowering"
    }

    fn run(&self, module: &mut IlModule) -> bool {
        let mut changed = false;
        for func in &mut module.functions {
            for block in &mut func.blocks {
                for instr in &mut block.instructions {
                    if !matches!(instr.opcode, Opcode::Call | Opcode::CallVoid) {
                        continue;
                    }
                    let callee = instr.extra.iter().find_map(|e| match e {
                        ExtraOperand::Callee(name) => Some(name.clone()),
                        _ => None,
                    });
                    let Some(callee) = callee else { continue };
                    let leaf = callee.rsplit('.').next().unwrap_or(&callee);
                    match leaf {
                        "peek" => {
                            instr.opcode = Opcode::HwRead;
                            instr.extra.clear();
                            changed = true;
                        }
                        "poke" => {
                            instr.opcode = Opcode::HwWrite;
                            instr.result = None;
                            instr.extra.clear();
                            changed = true;
                        }
                        _ => {}
                    }
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_il::{IlFunction, Value};
    use blend65_types::TypeRegistry;

    #[test]
    fn rewrites_a_hand_built_peek_call() {
        let types = TypeRegistry::new();
        let mut module = IlModule::new("test");
        let mut func = IlFunction::new("test.blit", Vec::new(), types.void());
        let entry = func.entry_block;
        let addr = Value::Constant(53281, types.word());
        func.emit(entry, Opcode::Call, vec![addr], vec![ExtraOperand::Callee("peek".into())], Some(types.byte()), None);
        func.emit(entry, Opcode::ReturnVoid, Vec::new(), Vec::new(), None, None);
        module.functions.push(func);

        let pass = IntrinsicLoweringPass;
        let changed = pass.run(&mut module);
        assert!(changed);
        let func = module.function("test.blit").unwrap();
        assert!(func.blocks[0].instructions.iter().any(|i| i.opcode == Opcode::HwRead));
        assert!(!func.blocks[0].instructions.iter().any(|i| i.opcode == Opcode::Call));
    }
}
