//! Pass 1: symbol collection.
//!
//! Walks the declarations of one [`Program`], creating its module scope and
//! one function scope per function, registering a [`SymbolEntry`] for every
//! declaration. Duplicate names in the same scope produce `S004
//! DuplicateDeclaration` with related-info pointing at the first
//! occurrence. Imports register a symbol whose type stays `Unknown` until
//! [`crate::module::resolve_binding`] fixes it up against the exporting
//! module.

use crate::symbol::{Declare, ScopeId, ScopeKind, SymbolEntry, SymbolId, SymbolKind, SymbolTable};
use blend65_ast::Decl;
use blend65_ast::Program;
use blend65_base::{Diagnostic, DiagnosticSink, Interner, Symbol};
use blend65_types::TypeInfo;
use rustc_hash::FxHashSet;
use std::rc::Rc;

/// What pass 1 produces for one module, handed to pass 2 (`resolve.rs`) and
/// pass 3 (`check.rs`) so they don't need to re-walk declarations.
pub struct CollectResult {
    pub module_scope: ScopeId,
    /// One entry per function: its AST, its freshly created function
    /// scope, and its symbol id in the module scope.
    pub functions: Vec<FunctionCollect>,
    /// Top-level `let`/`const` declarations paired with their symbol id.
    pub variables: Vec<(SymbolId, blend65_ast::NodeId)>,
    /// Names of `TypeDef`s declared `is_enum: true`. A bare reference to
    /// one of these in a type annotation resolves to the `byte` backing
    /// type (DESIGN.md records this as the Open Question resolution for
    /// how enum-typed annotations lower, since `TypeInfo` has no enum
    /// variant of its own).
    pub enum_types: FxHashSet<Symbol>,
}

pub struct FunctionCollect {
    pub symbol: SymbolId,
    pub scope: ScopeId,
    pub params: Vec<SymbolId>,
}

pub fn collect(program: &Program<'_>, symbols: &mut SymbolTable, interner: &Interner, parent_scope: ScopeId, diags: &mut DiagnosticSink) -> CollectResult {
    let module_scope = symbols.new_scope(ScopeKind::Module, parent_scope);
    let mut functions = Vec::new();
    let mut variables = Vec::new();
    let mut enum_types = FxHashSet::default();

    for decl in program.decls {
        match decl {
            Decl::Variable { name, name_span, is_const, is_export, init, .. } => {
                let entry = SymbolEntry {
                    name: *name,
                    kind: if *is_const { SymbolKind::Constant } else { SymbolKind::Variable },
                    ty: Rc::new(TypeInfo::Unknown),
                    declaration_span: *name_span,
                    owning_scope: module_scope,
                    is_exported: *is_export,
                    is_const: *is_const,
                    initializer: init.map(|e| e.id()),
                    parameters: None,
                    imported_from: None,
                };
                if let Declare::Ok(id) = declare_or_report(symbols, module_scope, entry, interner, diags) {
                    if let Some(init) = init {
                        variables.push((id, init.id()));
                    }
                }
            }
            Decl::Function { name, name_span, is_export, params, .. } => {
                let func_scope = symbols.new_scope(ScopeKind::Function, module_scope);
                let fn_entry = SymbolEntry {
                    name: *name,
                    kind: SymbolKind::Function,
                    ty: Rc::new(TypeInfo::Unknown),
                    declaration_span: *name_span,
                    owning_scope: module_scope,
                    is_exported: *is_export,
                    is_const: false,
                    initializer: None,
                    parameters: Some(Vec::new()),
                    imported_from: None,
                };
                let fn_id = match declare_or_report(symbols, module_scope, fn_entry, interner, diags) {
                    Declare::Ok(id) => id,
                    Declare::Duplicate { existing, .. } => existing,
                };

                let mut param_ids = Vec::new();
                for p in params.iter() {
                    let param_entry = SymbolEntry {
                        name: p.name,
                        kind: SymbolKind::Parameter,
                        ty: Rc::new(TypeInfo::Unknown),
                        declaration_span: p.span,
                        owning_scope: func_scope,
                        is_exported: false,
                        is_const: false,
                        initializer: None,
                        parameters: None,
                        imported_from: None,
                    };
                    if let Declare::Ok(pid) = declare_or_report(symbols, func_scope, param_entry, interner, diags) {
                        param_ids.push(pid);
                    }
                }
                symbols.symbol_mut(fn_id).parameters = Some(param_ids.clone());
                functions.push(FunctionCollect { symbol: fn_id, scope: func_scope, params: param_ids });
            }
            Decl::TypeDef { name, is_enum, members, span, .. } => {
                if *is_enum {
                    enum_types.insert(*name);
                    for &member in members.iter() {
                        let entry = SymbolEntry {
                            name: member,
                            kind: SymbolKind::EnumMember,
                            ty: Rc::new(TypeInfo::Byte),
                            declaration_span: *span,
                            owning_scope: module_scope,
                            is_exported: false,
                            is_const: true,
                            initializer: None,
                            parameters: None,
                            imported_from: None,
                        };
                        declare_or_report(symbols, module_scope, entry, interner, diags);
                    }
                }
            }
            Decl::Import { bindings, source_module, .. } => {
                for binding in bindings.iter() {
                    let local_name = binding.alias.unwrap_or(binding.name);
                    let entry = SymbolEntry {
                        name: local_name,
                        kind: SymbolKind::Imported,
                        ty: Rc::new(TypeInfo::Unknown),
                        declaration_span: binding.span,
                        owning_scope: module_scope,
                        is_exported: false,
                        is_const: false,
                        initializer: None,
                        parameters: None,
                        imported_from: Some((*source_module, binding.name)),
                    };
                    declare_or_report(symbols, module_scope, entry, interner, diags);
                }
            }
        }
    }

    CollectResult { module_scope, functions, variables, enum_types }
}

fn declare_or_report(symbols: &mut SymbolTable, scope: ScopeId, entry: SymbolEntry, interner: &Interner, diags: &mut DiagnosticSink) -> Declare {
    let span = entry.declaration_span;
    let name = entry.name;
    let result = symbols.declare(scope, entry);
    if let Declare::Duplicate { first_span, .. } = result {
        diags.push(
            Diagnostic::error("S004", format!("duplicate declaration of `{}`", interner.resolve(name)), span)
                .with_related(first_span, "first declared here"),
        );
    }
    result
}
