//! Pass 2: type resolution.
//!
//! Turns the surface-syntax [`TypeExpr`] written in a variable/parameter/
//! return annotation into a resolved, interned [`TypeInfo`]. Also fills in
//! every function symbol's parameter/return types and every variable
//! symbol's declared type, so pass 3 (`check.rs`) only ever deals with
//! `Rc<TypeInfo>`.

use crate::symbol::{ScopeId, SymbolTable};
use blend65_ast::ty::{ArrayLen, TypeExpr};
use blend65_ast::{Decl, Program};
use blend65_base::{Diagnostic, DiagnosticSink, Interner, Span, Symbol};
use blend65_types::{TypeInfo, TypeRegistry};
use rustc_hash::FxHashSet;
use std::rc::Rc;

/// Resolves one surface type annotation. `enum_types` lets a bare
/// identifier that names a `## Name` enum declaration resolve to its
/// `byte` backing representation instead of falling through to `S003
/// UnknownType`.
pub fn resolve_type(registry: &mut TypeRegistry, interner: &Interner, enum_types: &FxHashSet<Symbol>, ty: &TypeExpr<'_>, diags: &mut DiagnosticSink) -> Rc<TypeInfo> {
    match ty {
        TypeExpr::Named { name, span } => resolve_named(registry, interner, enum_types, *name, *span, diags),
        TypeExpr::Array { element, len, span } => {
            let elem_ty = resolve_type(registry, interner, enum_types, element, diags);
            let len = match len {
                ArrayLen::Fixed(n) => Some(*n),
                ArrayLen::Inferred => None,
            };
            let _ = span;
            registry.array(elem_ty, len)
        }
    }
}

fn resolve_named(registry: &mut TypeRegistry, interner: &Interner, enum_types: &FxHashSet<Symbol>, name: Symbol, span: Span, diags: &mut DiagnosticSink) -> Rc<TypeInfo> {
    let text = interner.resolve(name);
    if let Some(t) = registry.primitive_named(text) {
        return t;
    }
    match text {
        // A `string` annotation denotes a read-only run of text bytes in
        // memory; there is no distinct string kind in `TypeInfo`; it
        // lowers to a pointer to `byte`, matching how `peek`/array
        // indexing already treat in-memory byte runs (DESIGN.md).
        "string" => registry.pointer(registry.byte()),
        // `callback` names a function value whose own signature is not
        // spelled out at the use site; resolved to a niladic void function
        // pointer placeholder until assigned (DESIGN.md Open Question:
        // function-typed locals only appear as call targets chosen by
        // constant folding, never invoked through an unresolved signature).
        "callback" => registry.function(Vec::new(), registry.void()),
        _ => {
            if enum_types.contains(&name) {
                return registry.byte();
            }
            diags.push(Diagnostic::error("S003", format!("unknown type `{text}`"), span));
            registry.unknown()
        }
    }
}

/// Assigns resolved types to every declared symbol in one module: function
/// parameter/return types from their annotations, and `let`/`const`
/// declared types when an explicit annotation is present.
pub fn resolve_declared_types(
    program: &Program<'_>,
    symbols: &mut SymbolTable,
    registry: &mut TypeRegistry,
    interner: &Interner,
    enum_types: &FxHashSet<Symbol>,
    collected: &crate::collect::CollectResult,
    diags: &mut DiagnosticSink,
) {
    let mut func_idx = 0usize;
    for decl in program.decls {
        match decl {
            Decl::Variable { name, type_annotation, .. } => {
                if let Some(annotation) = type_annotation {
                    let ty = resolve_type(registry, interner, enum_types, annotation, diags);
                    if let Some(id) = symbols.lookup(collected.module_scope, *name) {
                        symbols.symbol_mut(id).ty = ty;
                    }
                }
            }
            Decl::Function { params, return_type, .. } => {
                let fc = &collected.functions[func_idx];
                func_idx += 1;
                let mut param_types = Vec::with_capacity(params.len());
                for (p, &pid) in params.iter().zip(fc.params.iter()) {
                    let ty = resolve_type(registry, interner, enum_types, &p.type_annotation, diags);
                    symbols.symbol_mut(pid).ty = ty.clone();
                    param_types.push(ty);
                }
                let ret = resolve_type(registry, interner, enum_types, return_type, diags);
                symbols.symbol_mut(fc.symbol).ty = registry.function(param_types, ret);
            }
            Decl::TypeDef { .. } | Decl::Import { .. } => {}
        }
    }
}

pub fn module_scope_of(collected: &crate::collect::CollectResult) -> ScopeId {
    collected.module_scope
}
