//! Declaration parsing: `import`, `function`, and top-level `let`/`const`.

use crate::Parser;
use blend65_ast::{Decl, ImportBinding, Param};
use blend65_base::{Diagnostic, Span};
use blend65_lexer::TokenKind;

impl<'src, 'a> Parser<'src, 'a> {
    /// `import <bindings> from <qualified.name>;`
    pub(crate) fn parse_import(&mut self) -> Decl<'a> {
        let start = self.current_span();
        self.advance();
        let mut bindings = Vec::new();
        loop {
            let (name, name_span) = self.expect_identifier("expected an imported name");
            let alias = if self.match_tok(&TokenKind::As) { Some(self.expect_identifier("expected an alias name after `as`").0) } else { None };
            bindings.push(ImportBinding { name, alias, span: name_span });
            if !self.match_tok(&TokenKind::Comma) {
                break;
            }
        }
        if bindings.is_empty() {
            self.error_at("P011", "import list must name at least one binding", start);
        }
        self.expect(&TokenKind::From, "expected `from` after import bindings");
        let (source_module, source_module_text, module_span) = self.parse_qualified_name();
        let semi = self.expect(&TokenKind::Semicolon, "expected `;` after import declaration");
        let span = start.merge(module_span).merge(semi.span);
        let bindings = self.arenas.bindings.alloc_slice(bindings);
        Decl::Import { bindings, source_module, source_module_text, span, id: self.ids.fresh() }
    }

    /// `[export] function name(params): return_type { body }`. A function
    /// named `main` is implicitly exported (with a warning if it wasn't
    /// already marked `export`); a second exported `main` is an error.
    pub(crate) fn parse_function(&mut self, mut is_export: bool, export_span: Span) -> Decl<'a> {
        let start = if is_export { export_span } else { self.current_span() };
        self.advance(); // `function`
        let (name, name_span) = self.expect_identifier("expected a function name");
        self.expect(&TokenKind::LParen, "expected `(` after function name");
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (pname, pspan) = self.expect_identifier("expected a parameter name");
                self.expect(&TokenKind::Colon, "expected `:` after parameter name");
                let type_annotation = self.parse_type_annotation();
                let span = pspan.merge(type_annotation.span());
                params.push(Param { name: pname, type_annotation, span });
                if !self.match_tok(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "expected `)` after parameter list");
        self.expect(&TokenKind::Colon, "expected `:` before return type");
        let return_type = self.parse_type_annotation();
        let is_main = self.interner.resolve(name) == "main";
        if is_main {
            if !is_export {
                self.diagnostics.push(Diagnostic::warning("W001", "`main` is implicitly exported", name_span));
                is_export = true;
            }
            self.note_export_main(name_span);
        }
        let body = self.parse_block();
        let span = start.merge(self.previous_span());
        let params = self.arenas.params.alloc_slice(params);
        Decl::Function { name, name_span, is_export, params, return_type, body, span, id: self.ids.fresh() }
    }

    /// `[export] (let|const) name [: type] [= expr];`
    pub(crate) fn parse_variable(&mut self, is_export: bool) -> Decl<'a> {
        let start = self.current_span();
        let is_const = self.check(&TokenKind::Const);
        self.advance();
        let (name, name_span) = self.expect_identifier("expected a variable name");
        let type_annotation = if self.match_tok(&TokenKind::Colon) { Some(self.parse_type_annotation()) } else { None };
        let init = if self.match_tok(&TokenKind::Eq) { Some(self.parse_expr()) } else { None };
        if is_const && init.is_none() {
            self.error_at("P007", "`const` declaration requires an initializer", name_span);
        }
        let semi = self.expect(&TokenKind::Semicolon, "expected `;` after variable declaration");
        let span = start.merge(semi.span);
        Decl::Variable { name, name_span, is_const, is_export, type_annotation, init, span, id: self.ids.fresh() }
    }
}
