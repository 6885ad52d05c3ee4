//! Typed IL values.

use blend65_types::TypeInfo;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId(u32);

impl RegisterId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A typed IL value: a compile-time constant, a
/// virtual register produced by some instruction, or a block label used as
/// a branch target.
#[derive(Debug, Clone)]
pub enum Value {
    Constant(u32, Rc<TypeInfo>),
    Register(RegisterId, Rc<TypeInfo>),
    Label(BlockId),
}

impl Value {
    pub fn ty(&self) -> Option<Rc<TypeInfo>> {
        match self {
            Value::Constant(_, ty) | Value::Register(_, ty) => Some(ty.clone()),
            Value::Label(_) => None,
        }
    }

    pub fn as_register(&self) -> Option<RegisterId> {
        match self {
            Value::Register(id, _) => Some(*id),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<u32> {
        match self {
            Value::Constant(v, _) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Constant(v, ty) => write!(f, "{v}:{ty}"),
            Value::Register(id, ty) => write!(f, "{id}:{ty}"),
            Value::Label(b) => write!(f, "{b}"),
        }
    }
}
