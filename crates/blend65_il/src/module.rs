//! A whole compiled module's IL.

use crate::function::IlFunction;
use crate::instr::MemSlot;
use blend65_types::TypeInfo;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Global {
    pub slot: MemSlot,
    pub ty: Rc<TypeInfo>,
    /// `Some` for `let`-initialized globals with a constant-foldable
    /// initializer; `None` for globals whose initial value is zero or
    /// computed at runtime.
    pub init: Option<u32>,
}

/// One module's worth of generated IL: its functions and file-scope
/// globals, plus which function (if any) is this compilation's entry
/// point.
#[derive(Debug, Clone, Default)]
pub struct IlModule {
    pub name: String,
    pub functions: Vec<IlFunction>,
    pub globals: Vec<Global>,
    pub entry_point: Option<String>,
}

impl IlModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), functions: Vec::new(), globals: Vec::new(), entry_point: None }
    }

    pub fn function(&self, name: &str) -> Option<&IlFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// True once every function in the module satisfies
    /// [`IlFunction::is_well_formed`].
    pub fn is_well_formed(&self) -> bool {
        self.functions.iter().all(IlFunction::is_well_formed)
    }
}

impl std::fmt::Display for IlModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for g in &self.globals {
            writeln!(f, "global {} : {}", g.slot.0, g.ty)?;
        }
        for func in &self.functions {
            writeln!(f, "\nfunction {}({}) -> {} {{", func.name, func.parameters.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect::<Vec<_>>().join(", "), func.return_type)?;
            for block in &func.blocks {
                writeln!(f, "  {}:", block.label)?;
                for instr in &block.instructions {
                    writeln!(f, "    {instr}")?;
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
