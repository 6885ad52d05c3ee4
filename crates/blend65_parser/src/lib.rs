//! # blend65_parser
//!
//! Recursive-descent parser with Pratt expression parsing.
//! `parse()` always returns a complete [`Program`], possibly containing
//! `Expr::Error`/empty-block placeholders, plus a [`DiagnosticSink`] of
//! everything that went wrong along the way. A single malformed statement
//! never aborts parsing of the rest of the file.

mod decl;
mod expr;
mod stmt;
mod ty;

use blend65_ast::{AstArenas, Decl, ModuleHeader, NodeIdGen, Program};
use blend65_base::{Diagnostic, DiagnosticSink, Interner, Span, Symbol};
use blend65_lexer::{Token, TokenKind};

/// Tracks whether the parser is currently inside constructs that make
/// `break`/`continue`/nested-function rules meaningful.
#[derive(Default, Clone, Copy)]
pub struct ParserFlags {
    pub in_loop: u32,
    pub in_switch: u32,
    pub function_depth: u32,
}

pub struct Parser<'src, 'a> {
    tokens: Vec<Token>,
    pos: usize,
    pub diagnostics: DiagnosticSink,
    pub interner: &'src mut Interner,
    pub arenas: &'a AstArenas<'a>,
    pub ids: NodeIdGen,
    flags: ParserFlags,
    seen_module_header: Option<Span>,
    seen_export_main: Option<Span>,
}

impl<'src, 'a> Parser<'src, 'a> {
    pub fn new(tokens: Vec<Token>, interner: &'src mut Interner, arenas: &'a AstArenas<'a>) -> Self {
        // Newlines are whitespace for statement structure in this
        // implementation: the grammar always shows explicit
        // `;` terminators, so elided-semicolon newlines are not load
        // bearing here (see DESIGN.md, "Elided-semicolon newlines").
        let tokens: Vec<Token> = tokens.into_iter().filter(|t| t.kind != TokenKind::Newline).collect();
        Self {
            tokens,
            pos: 0,
            diagnostics: DiagnosticSink::new(),
            interner,
            arenas,
            ids: NodeIdGen::new(),
            flags: ParserFlags::default(),
            seen_module_header: None,
            seen_export_main: None,
        }
    }

    /// Parses a full token stream into a `Program`. Never fails: parse
    /// errors are recorded as diagnostics and the caller inspects
    /// `diagnostics.has_errors()`.
    pub fn parse(tokens: Vec<Token>, interner: &'src mut Interner, arenas: &'a AstArenas<'a>) -> (Program<'a>, DiagnosticSink) {
        let mut parser = Parser::new(tokens, interner, arenas);
        let program = parser.parse_program();
        (program, parser.diagnostics)
    }

    fn parse_program(&mut self) -> Program<'a> {
        let start = self.current_span();
        let module = self.parse_optional_module_header();
        let mut decls = Vec::new();
        while !self.is_at_end() {
            if let Some(decl) = self.parse_top_level_decl() {
                decls.push(decl);
            }
        }
        let end = self.previous_span();
        Program { module, decls: self.arenas.decls.alloc_slice(decls), span: start.merge(end) }
    }

    fn parse_optional_module_header(&mut self) -> Option<ModuleHeader> {
        if !self.check(&TokenKind::Module) {
            return None;
        }
        let start = self.current_span();
        self.advance();
        let (name, text, name_span) = self.parse_qualified_name();
        self.expect(&TokenKind::Semicolon, "expected `;` after module declaration");
        let span = start.merge(name_span);
        if let Some(first) = self.seen_module_header {
            self.diagnostics.push(
                Diagnostic::error("P002", "duplicate module declaration", span).with_related(first, "first declared here"),
            );
        } else {
            self.seen_module_header = Some(span);
        }
        Some(ModuleHeader { name, name_text: text, span })
    }

    /// Parses `a.b.c`-style qualified names used for module paths.
    fn parse_qualified_name(&mut self) -> (Symbol, String, Span) {
        let mut text = String::new();
        let first = self.expect_identifier_text("expected a module name");
        let mut span = first.1;
        text += &first.0;
        while self.check(&TokenKind::Dot) {
            self.advance();
            let next = self.expect_identifier_text("expected a name after `.`");
            text.push('.');
            text += &next.0;
            span = span.merge(next.1);
        }
        let sym = self.interner.intern(&text);
        (sym, text, span)
    }

    fn parse_top_level_decl(&mut self) -> Option<Decl<'a>> {
        if self.check(&TokenKind::Module) {
            // A duplicate module header that slipped past the top: report
            // and consume it rather than looping forever.
            self.parse_optional_module_header();
            return None;
        }
        let decl = if self.check(&TokenKind::Import) {
            self.parse_import()
        } else {
            let is_export = self.match_tok(&TokenKind::Export);
            let export_span = self.previous_span();
            if self.check(&TokenKind::Function) {
                self.parse_function(is_export, export_span)
            } else if self.check(&TokenKind::Let) || self.check(&TokenKind::Const) {
                self.parse_variable(is_export)
            } else {
                let span = self.current_span();
                self.error_at("P001", "expected a declaration (`function`, `let`, `const`, or `import`)", span);
                self.synchronize();
                return None;
            }
        };
        Some(decl)
    }

    // --- token stream primitives -------------------------------------------------

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.tokens.get(self.pos).map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn previous_span(&self) -> Span {
        self.previous().span
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    pub(crate) fn match_tok(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a token of `kind`, or reports `msg` and returns a
    /// zero-width synthetic token of the expected kind at the current
    /// position without advancing the cursor. Callers use the synthetic token to keep building a
    /// partial AST.
    pub(crate) fn expect(&mut self, kind: &TokenKind, msg: &str) -> Token {
        if self.check(kind) {
            self.advance()
        } else {
            let span = self.current_span();
            self.error_at("P001", msg, span);
            Token::new(kind.clone(), "", Span::point(span.start))
        }
    }

    fn expect_identifier_text(&mut self, msg: &str) -> (String, Span) {
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            let span = self.current_span();
            self.advance();
            (name, span)
        } else {
            let span = self.current_span();
            self.error_at("P001", msg, span);
            (String::new(), Span::point(span.start))
        }
    }

    pub(crate) fn expect_identifier(&mut self, msg: &str) -> (Symbol, Span) {
        let (text, span) = self.expect_identifier_text(msg);
        (self.interner.intern(&text), span)
    }

    pub(crate) fn error_at(&mut self, code: &'static str, msg: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(code, msg, span));
    }

    /// Advances past the current statement: on error, the parser skips
    /// tokens until a statement-starting keyword or a semicolon
    /// (inclusive) so the next top-level construct can be parsed cleanly.
    pub(crate) fn synchronize(&mut self) {
        while !self.is_at_end() {
            if matches!(self.previous().kind, TokenKind::Semicolon) {
                return;
            }
            if matches!(
                self.peek_kind(),
                TokenKind::Let
                    | TokenKind::Const
                    | TokenKind::Function
                    | TokenKind::If
                    | TokenKind::While
                    | TokenKind::For
                    | TokenKind::Do
                    | TokenKind::Switch
                    | TokenKind::Return
                    | TokenKind::Break
                    | TokenKind::Continue
                    | TokenKind::Import
                    | TokenKind::Export
            ) {
                return;
            }
            self.advance();
        }
    }

    pub(crate) fn flags(&self) -> ParserFlags {
        self.flags
    }

    pub(crate) fn enter_loop(&mut self) {
        self.flags.in_loop += 1;
    }

    pub(crate) fn exit_loop(&mut self) {
        self.flags.in_loop -= 1;
    }

    pub(crate) fn enter_switch(&mut self) {
        self.flags.in_switch += 1;
    }

    pub(crate) fn exit_switch(&mut self) {
        self.flags.in_switch -= 1;
    }

    pub(crate) fn note_export_main(&mut self, span: Span) {
        if let Some(first) = self.seen_export_main {
            self.diagnostics.push(
                Diagnostic::error("P004", "duplicate exported `main` function", span).with_related(first, "first declared here"),
            );
        } else {
            self.seen_export_main = Some(span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_ast::{Decl, Stmt};
    use blend65_lexer::Lexer;

    fn parse_src(src: &str) -> (Program<'static>, DiagnosticSink) {
        let (tokens, _) = Lexer::new(src).tokenize();
        let arenas: &'static AstArenas<'static> = Box::leak(Box::new(AstArenas::new()));
        let interner: &'static mut Interner = Box::leak(Box::new(Interner::new()));
        Parser::parse(tokens, interner, arenas)
    }

    #[test]
    fn empty_module_parses_with_no_diagnostics() {
        let (program, diags) = parse_src("module test;");
        assert!(diags.is_empty());
        assert!(program.module.is_some());
        assert_eq!(program.decls.len(), 0);
    }

    #[test]
    fn single_assignment_declares_one_variable() {
        let (program, diags) = parse_src("module test;\nlet x: byte = 42;");
        assert!(!diags.has_errors());
        assert_eq!(program.decls.len(), 1);
        assert!(matches!(program.decls[0], Decl::Variable { is_const: false, .. }));
    }

    #[test]
    fn const_without_initializer_is_an_error() {
        let (_, diags) = parse_src("module test;\nconst x: byte;");
        assert!(diags.has_errors());
    }

    #[test]
    fn conditional_function_parses_if_and_two_returns() {
        let src = "module test;\nfunction f(x: byte): byte {\n if (x > 10) { return 1; }\n return 0;\n}";
        let (program, diags) = parse_src(src);
        assert!(!diags.has_errors());
        let Decl::Function { body, .. } = &program.decls[0] else { panic!("expected function") };
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0], Stmt::If { .. }));
        assert!(matches!(body[1], Stmt::Return { .. }));
    }

    #[test]
    fn import_requires_at_least_one_binding() {
        let (_, diags) = parse_src("import from a.b;");
        assert!(diags.has_errors());
    }

    #[test]
    fn import_parses_bindings_with_alias() {
        let (program, diags) = parse_src("import foo, bar as baz from a.b;");
        assert!(!diags.has_errors());
        let Decl::Import { bindings, source_module_text, .. } = &program.decls[0] else { panic!("expected import") };
        assert_eq!(bindings.len(), 2);
        assert_eq!(source_module_text, "a.b");
    }

    #[test]
    fn main_function_is_implicitly_exported_with_warning() {
        let (program, diags) = parse_src("function main(): void { }");
        assert!(!diags.has_errors());
        assert_eq!(diags.iter().filter(|d| d.code == "W001").count(), 1);
        let Decl::Function { is_export, .. } = &program.decls[0] else { panic!("expected function") };
        assert!(is_export);
    }

    #[test]
    fn duplicate_exported_main_is_an_error() {
        let src = "export function main(): void { }\nexport function main(): void { }";
        let (_, diags) = parse_src(src);
        assert!(diags.iter().any(|d| d.code == "P004"));
    }

    #[test]
    fn for_range_is_the_only_supported_for_form() {
        let src = "function f(): void {\n for (i = 0 to 10) { }\n}";
        let (program, diags) = parse_src(src);
        assert!(!diags.has_errors());
        let Decl::Function { body, .. } = &program.decls[0] else { panic!("expected function") };
        assert!(matches!(body[0], Stmt::ForRange { .. }));
    }

    #[test]
    fn switch_has_no_implicit_fall_through() {
        let src = "function f(x: byte): void {\n switch (x) { case 1: break; default: break; }\n}";
        let (program, diags) = parse_src(src);
        assert!(!diags.has_errors());
        let Decl::Function { body, .. } = &program.decls[0] else { panic!("expected function") };
        let Stmt::Switch { cases, default, .. } = &body[0] else { panic!("expected switch") };
        assert_eq!(cases.len(), 1);
        assert!(default.is_some());
    }

    #[test]
    fn assignment_is_right_associative_and_lowest_precedence() {
        let src = "function f(): void {\n a = b = 1 + 2;\n}";
        let (program, diags) = parse_src(src);
        assert!(!diags.has_errors());
        let Decl::Function { body, .. } = &program.decls[0] else { panic!("expected function") };
        let Stmt::Expr { expr, .. } = &body[0] else { panic!("expected expr stmt") };
        match expr {
            blend65_ast::Expr::Assign { value, .. } => {
                assert!(matches!(value, blend65_ast::Expr::Assign { .. }));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let src = "function f(): void {\n break;\n}";
        let (_, diags) = parse_src(src);
        assert!(diags.iter().any(|d| d.code == "P009"));
    }

    #[test]
    fn malformed_statement_recovers_at_next_keyword() {
        let src = "function f(): void {\n let ;\n let y: byte = 1;\n}";
        let (program, diags) = parse_src(src);
        assert!(diags.has_errors());
        let Decl::Function { body, .. } = &program.decls[0] else { panic!("expected function") };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn expect_failure_produces_zero_width_synthetic_token_without_advancing() {
        // Missing `)` after the condition should not desynchronize parsing
        // of the rest of the `if`.
        let src = "function f(x: byte): void {\n if (x > 1 { }\n}";
        let (_, diags) = parse_src(src);
        assert!(diags.has_errors());
    }
}
