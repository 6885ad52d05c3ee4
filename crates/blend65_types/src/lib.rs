//! # blend65_types
//!
//! Type kinds and compatibility rules.
//!
//! `TypeInfo` is a closed sum (`void`, `bool`, `byte`, `word`, `pointer(T)`,
//! `array(T, n)`, `function(params, ret)`). Primitives are singletons held
//! by a per-compilation [`TypeRegistry`] (design note §9: "the compiler has
//! no process-wide state"); compound types are constructed on demand and
//! interned by structural equality so that `Rc` pointer identity matching
//! is never required — two structurally-equal array types compare equal
//! whether or not they share an allocation.

use rustc_hash::FxHashMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    Void,
    Bool,
    Byte,
    Word,
    /// A type that failed to resolve; downstream checks treat it as
    /// compatible with everything so that one bad annotation does not
    /// cascade into unrelated errors.
    Unknown,
    Pointer(Rc<TypeInfo>),
    Array { element: Rc<TypeInfo>, len: Option<u32> },
    Function { params: Vec<Rc<TypeInfo>>, return_type: Rc<TypeInfo> },
}

impl TypeInfo {
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeInfo::Byte | TypeInfo::Word)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeInfo::Unknown)
    }

    /// Byte width this type occupies at runtime. `bool` is stored as a
    /// byte (0/non-zero); arrays/pointers use their element width times
    /// length, or 2 for a bare pointer.
    pub fn width(&self) -> u32 {
        match self {
            TypeInfo::Void | TypeInfo::Unknown => 0,
            TypeInfo::Bool | TypeInfo::Byte => 1,
            TypeInfo::Word | TypeInfo::Pointer(_) => 2,
            TypeInfo::Array { element, len } => element.width() * len.unwrap_or(0),
            TypeInfo::Function { .. } => 2,
        }
    }
}

impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeInfo::Void => write!(f, "void"),
            TypeInfo::Bool => write!(f, "bool"),
            TypeInfo::Byte => write!(f, "byte"),
            TypeInfo::Word => write!(f, "word"),
            TypeInfo::Unknown => write!(f, "unknown"),
            TypeInfo::Pointer(t) => write!(f, "*{t}"),
            TypeInfo::Array { element, len: Some(n) } => write!(f, "{element}[{n}]"),
            TypeInfo::Array { element, len: None } => write!(f, "{element}[]"),
            TypeInfo::Function { params, return_type } => {
                write!(f, "function(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, "): {return_type}")
            }
        }
    }
}

/// Per-compilation owner of the primitive singletons and the compound-type
/// intern cache. Never shared across compilations (design note §9).
pub struct TypeRegistry {
    void: Rc<TypeInfo>,
    bool_: Rc<TypeInfo>,
    byte: Rc<TypeInfo>,
    word: Rc<TypeInfo>,
    unknown: Rc<TypeInfo>,
    cache: FxHashMap<TypeInfo, Rc<TypeInfo>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            void: Rc::new(TypeInfo::Void),
            bool_: Rc::new(TypeInfo::Bool),
            byte: Rc::new(TypeInfo::Byte),
            word: Rc::new(TypeInfo::Word),
            unknown: Rc::new(TypeInfo::Unknown),
            cache: FxHashMap::default(),
        }
    }

    pub fn void(&self) -> Rc<TypeInfo> {
        self.void.clone()
    }
    pub fn bool_(&self) -> Rc<TypeInfo> {
        self.bool_.clone()
    }
    pub fn byte(&self) -> Rc<TypeInfo> {
        self.byte.clone()
    }
    pub fn word(&self) -> Rc<TypeInfo> {
        self.word.clone()
    }
    pub fn unknown(&self) -> Rc<TypeInfo> {
        self.unknown.clone()
    }

    /// Resolves a primitive type name to its singleton, or `None` if `name`
    /// isn't one of the reserved primitive names (caller then treats it as
    /// a user-defined type name lookup).
    pub fn primitive_named(&self, name: &str) -> Option<Rc<TypeInfo>> {
        match name {
            "void" => Some(self.void()),
            "bool" | "boolean" => Some(self.bool_()),
            "byte" => Some(self.byte()),
            "word" => Some(self.word()),
            _ => None,
        }
    }

    fn intern(&mut self, ty: TypeInfo) -> Rc<TypeInfo> {
        if let Some(existing) = self.cache.get(&ty) {
            return existing.clone();
        }
        let rc = Rc::new(ty.clone());
        self.cache.insert(ty, rc.clone());
        rc
    }

    pub fn pointer(&mut self, element: Rc<TypeInfo>) -> Rc<TypeInfo> {
        self.intern(TypeInfo::Pointer(element))
    }

    pub fn array(&mut self, element: Rc<TypeInfo>, len: Option<u32>) -> Rc<TypeInfo> {
        self.intern(TypeInfo::Array { element, len })
    }

    pub fn function(&mut self, params: Vec<Rc<TypeInfo>>, return_type: Rc<TypeInfo>) -> Rc<TypeInfo> {
        self.intern(TypeInfo::Function { params, return_type })
    }

    /// The narrowest of `byte`/`word` that fits `value`.
    pub fn narrowest_for(&self, value: u32) -> Rc<TypeInfo> {
        if value <= 0xFF {
            self.byte()
        } else {
            self.word()
        }
    }

    /// Numeric promotion: the wider of two numeric types. Panics if either type is not numeric — callers check
    /// `is_numeric()` first.
    pub fn promote(&self, a: &TypeInfo, b: &TypeInfo) -> Rc<TypeInfo> {
        debug_assert!(a.is_numeric() && b.is_numeric());
        if matches!(a, TypeInfo::Word) || matches!(b, TypeInfo::Word) {
            self.word()
        } else {
            self.byte()
        }
    }

    /// Least-upper-bound of two element types for array-literal inference.
    pub fn lub(&self, a: &TypeInfo, b: &TypeInfo) -> Rc<TypeInfo> {
        match (a, b) {
            (TypeInfo::Bool, TypeInfo::Bool) => self.bool_(),
            (TypeInfo::Bool, other) | (other, TypeInfo::Bool) if other.is_numeric() => self.byte(),
            (x, y) if x.is_numeric() && y.is_numeric() => self.promote(x, y),
            _ => self.unknown(),
        }
    }

    /// Whether a value of type `from` may be assigned into a location of
    /// type `to`. `Unknown` is compatible with anything so a single
    /// upstream type error does not cascade.
    pub fn assignable(&self, from: &TypeInfo, to: &TypeInfo) -> bool {
        if from.is_unknown() || to.is_unknown() {
            return true;
        }
        if from == to {
            return true;
        }
        matches!((from, to), (TypeInfo::Byte, TypeInfo::Word))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowest_for_boundaries() {
        let reg = TypeRegistry::new();
        assert_eq!(*reg.narrowest_for(255), TypeInfo::Byte);
        assert_eq!(*reg.narrowest_for(256), TypeInfo::Word);
        assert_eq!(*reg.narrowest_for(65535), TypeInfo::Word);
    }

    #[test]
    fn byte_widens_to_word_on_assignment() {
        let reg = TypeRegistry::new();
        assert!(reg.assignable(&TypeInfo::Byte, &TypeInfo::Word));
        assert!(!reg.assignable(&TypeInfo::Word, &TypeInfo::Byte));
    }

    #[test]
    fn compound_types_intern_by_structural_equality() {
        let mut reg = TypeRegistry::new();
        let a = reg.array(reg.byte(), Some(4));
        let b = reg.array(reg.byte(), Some(4));
        assert!(Rc::ptr_eq(&a, &b));
        let c = reg.array(reg.byte(), Some(5));
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn unknown_is_assignable_both_ways() {
        let reg = TypeRegistry::new();
        assert!(reg.assignable(&TypeInfo::Unknown, &TypeInfo::Byte));
        assert!(reg.assignable(&TypeInfo::Byte, &TypeInfo::Unknown));
    }
}
