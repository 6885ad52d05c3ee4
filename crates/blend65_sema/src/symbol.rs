//! Symbols and scopes.
//!
//! The language is function-scoped, not block-scoped: `if`/`while`/`for`
//! bodies do not introduce a new [`Scope`]. Every module gets exactly one
//! module scope; every function gets exactly one function scope, parented
//! to its module scope. An [`IntrinsicScope`] sits above every module
//! scope and cannot be shadowed.

use blend65_base::{Span, Symbol};
use blend65_types::TypeInfo;
use rustc_hash::FxHashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Intrinsic,
    Module,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Constant,
    Imported,
    Intrinsic,
    EnumMember,
}

/// A resolved symbol. `initializer`/`parameters` refer
/// back to AST nodes by [`blend65_ast::NodeId`] rather than owning a
/// reference into the arena.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: Symbol,
    pub kind: SymbolKind,
    pub ty: Rc<TypeInfo>,
    pub declaration_span: Span,
    pub owning_scope: ScopeId,
    pub is_exported: bool,
    pub is_const: bool,
    pub initializer: Option<blend65_ast::NodeId>,
    pub parameters: Option<Vec<SymbolId>>,
    /// `(source_module, original_name)` for symbols registered by an
    /// `import` declaration.
    pub imported_from: Option<(Symbol, Symbol)>,
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    symbols: FxHashMap<Symbol, SymbolId>,
}

impl Scope {
    pub fn lookup_local(&self, name: Symbol) -> Option<SymbolId> {
        self.symbols.get(&name).copied()
    }
}

/// Owns every [`Scope`] and [`SymbolEntry`] produced during symbol
/// collection for one compilation unit. Cross-references are scope ids and
/// symbol ids, never `&Scope`/`&SymbolEntry`.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<SymbolEntry>,
    intrinsic_scope: ScopeId,
}

/// Outcome of registering a declaration into a scope.
pub enum Declare {
    Ok(SymbolId),
    /// Another symbol with the same name already exists in this scope;
    /// carries the first declaration's span for `S004 DuplicateDeclaration`
    /// related-info.
    Duplicate { existing: SymbolId, first_span: Span },
}

impl SymbolTable {
    /// Creates a fresh table seeded with the intrinsic scope.
    pub fn new() -> Self {
        let intrinsic_scope = ScopeId(0);
        let scopes = vec![Scope {
            id: intrinsic_scope,
            kind: ScopeKind::Intrinsic,
            parent: None,
            children: Vec::new(),
            symbols: FxHashMap::default(),
        }];
        Self { scopes, symbols: Vec::new(), intrinsic_scope }
    }

    pub fn intrinsic_scope(&self) -> ScopeId {
        self.intrinsic_scope
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn symbol(&self, id: SymbolId) -> &SymbolEntry {
        &self.symbols[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut SymbolEntry {
        &mut self.symbols[id.index()]
    }

    /// Creates a new scope parented to `parent` (or the intrinsic scope's
    /// root for a fresh module scope).
    pub fn new_scope(&mut self, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            symbols: FxHashMap::default(),
        });
        self.scopes[parent.index()].children.push(id);
        id
    }

    /// Registers `entry` into `scope`, rejecting a duplicate name already
    /// bound *directly* in that scope (shadowing an outer scope's symbol is
    /// not an error; the language is function-scoped so this only ever
    /// triggers within one module or function scope).
    pub fn declare(&mut self, scope: ScopeId, entry: SymbolEntry) -> Declare {
        if let Some(&existing) = self.scopes[scope.index()].symbols.get(&entry.name) {
            return Declare::Duplicate { existing, first_span: self.symbols[existing.index()].declaration_span };
        }
        let name = entry.name;
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(entry);
        self.scopes[scope.index()].symbols.insert(name, id);
        id
    }

    /// Forcibly binds `name` to `target` in `scope`, used by the import
    /// resolver to bind an (possibly aliased) local name to an already
    /// existing symbol from another module without creating a duplicate
    /// `SymbolEntry`.
    pub fn bind_alias(&mut self, scope: ScopeId, name: Symbol, target: SymbolId) {
        self.scopes[scope.index()].symbols.insert(name, target);
    }

    /// Walks from `scope` up through parents (and finally the intrinsic
    /// scope) looking for `name`.
    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(sym) = self.scopes[id.index()].lookup_local(name) {
                return Some(sym);
            }
            current = self.scopes[id.index()].parent;
        }
        None
    }

    pub fn symbols_in(&self, scope: ScopeId) -> impl Iterator<Item = (Symbol, SymbolId)> + '_ {
        self.scopes[scope.index()].symbols.iter().map(|(&n, &id)| (n, id))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed signature of a built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// `peek(addr: word): byte`
    Peek,
    /// `poke(addr: word, value: byte): void`
    Poke,
    /// `hi(w: word): byte`
    Hi,
    /// `lo(w: word): byte`
    Lo,
    /// `len(a: array): word`
    Len,
}

impl Intrinsic {
    pub fn by_name(name: &str) -> Option<Intrinsic> {
        Some(match name {
            "peek" => Intrinsic::Peek,
            "poke" => Intrinsic::Poke,
            "hi" => Intrinsic::Hi,
            "lo" => Intrinsic::Lo,
            "len" => Intrinsic::Len,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Peek => "peek",
            Intrinsic::Poke => "poke",
            Intrinsic::Hi => "hi",
            Intrinsic::Lo => "lo",
            Intrinsic::Len => "len",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Intrinsic::Peek | Intrinsic::Hi | Intrinsic::Lo | Intrinsic::Len => 1,
            Intrinsic::Poke => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_base::{Interner, Position};

    fn span() -> Span {
        Span::point(Position::START)
    }

    #[test]
    fn declaring_twice_in_same_scope_reports_duplicate() {
        let mut table = SymbolTable::new();
        let mut interner = Interner::new();
        let module = table.new_scope(ScopeKind::Module, table.intrinsic_scope());
        let name = interner.intern("x");
        let entry = |name| SymbolEntry {
            name,
            kind: SymbolKind::Variable,
            ty: Rc::new(TypeInfo::Byte),
            declaration_span: span(),
            owning_scope: module,
            is_exported: false,
            is_const: false,
            initializer: None,
            parameters: None,
            imported_from: None,
        };
        let first = table.declare(module, entry(name));
        assert!(matches!(first, Declare::Ok(_)));
        let second = table.declare(module, entry(name));
        assert!(matches!(second, Declare::Duplicate { .. }));
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let mut table = SymbolTable::new();
        let mut interner = Interner::new();
        let module = table.new_scope(ScopeKind::Module, table.intrinsic_scope());
        let func = table.new_scope(ScopeKind::Function, module);
        let name = interner.intern("g");
        let id = table.declare(
            module,
            SymbolEntry {
                name,
                kind: SymbolKind::Function,
                ty: Rc::new(TypeInfo::Void),
                declaration_span: span(),
                owning_scope: module,
                is_exported: false,
                is_const: false,
                initializer: None,
                parameters: None,
                imported_from: None,
            },
        );
        let Declare::Ok(id) = id else { panic!() };
        assert_eq!(table.lookup(func, name), Some(id));
    }

    #[test]
    fn intrinsics_cannot_be_shadowed_by_lookup_shortcircuit() {
        // Intrinsics are registered once in the intrinsic scope; module
        // scopes parent to it so `peek` resolves even with no local
        // declaration.
        assert_eq!(Intrinsic::by_name("peek"), Some(Intrinsic::Peek));
        assert_eq!(Intrinsic::Peek.arity(), 1);
        assert_eq!(Intrinsic::Poke.arity(), 2);
    }
}
