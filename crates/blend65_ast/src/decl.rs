//! Declaration and program-level AST nodes.

use crate::expr::Expr;
use crate::node_id::NodeId;
use crate::stmt::Block;
use crate::ty::TypeExpr;
use blend65_base::{Span, Symbol};

#[derive(Debug, Clone)]
pub struct Param<'a> {
    pub name: Symbol,
    pub type_annotation: TypeExpr<'a>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImportBinding {
    pub name: Symbol,
    pub alias: Option<Symbol>,
    pub span: Span,
}

/// `module <qualified.name>;`
#[derive(Debug, Clone)]
pub struct ModuleHeader {
    pub name: Symbol,
    pub name_text: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl<'a> {
    Variable {
        name: Symbol,
        name_span: Span,
        is_const: bool,
        is_export: bool,
        type_annotation: Option<TypeExpr<'a>>,
        init: Option<&'a Expr<'a>>,
        span: Span,
        id: NodeId,
    },
    Function {
        name: Symbol,
        name_span: Span,
        is_export: bool,
        params: &'a [Param<'a>],
        return_type: TypeExpr<'a>,
        body: Block<'a>,
        span: Span,
        id: NodeId,
    },
    /// `## A Point has: ...` style type/enum declarations: a named type
    /// with either field members (records are not in the type system but
    /// the member names are retained for diagnostics) or enum members.
    TypeDef {
        name: Symbol,
        is_enum: bool,
        members: &'a [Symbol],
        span: Span,
        id: NodeId,
    },
    Import {
        bindings: &'a [ImportBinding],
        source_module: Symbol,
        source_module_text: String,
        span: Span,
        id: NodeId,
    },
}

impl<'a> Decl<'a> {
    pub fn span(&self) -> Span {
        match self {
            Decl::Variable { span, .. } | Decl::Function { span, .. } | Decl::TypeDef { span, .. } | Decl::Import { span, .. } => *span,
        }
    }

    pub fn id(&self) -> NodeId {
        match self {
            Decl::Variable { id, .. } | Decl::Function { id, .. } | Decl::TypeDef { id, .. } | Decl::Import { id, .. } => *id,
        }
    }

    pub fn name(&self) -> Option<Symbol> {
        match self {
            Decl::Variable { name, .. } | Decl::Function { name, .. } | Decl::TypeDef { name, .. } => Some(*name),
            Decl::Import { .. } => None,
        }
    }

    pub fn is_exported(&self) -> bool {
        match self {
            Decl::Variable { is_export, .. } | Decl::Function { is_export, .. } => *is_export,
            Decl::TypeDef { .. } | Decl::Import { .. } => false,
        }
    }
}

/// The root AST node for one parsed `.blend` file.
#[derive(Debug, Clone)]
pub struct Program<'a> {
    pub module: Option<ModuleHeader>,
    pub decls: &'a [Decl<'a>],
    pub span: Span,
}
