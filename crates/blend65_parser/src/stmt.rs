//! Statement parsing.

use crate::Parser;
use blend65_ast::{Block, Stmt, SwitchCase};
use blend65_lexer::TokenKind;

impl<'src, 'a> Parser<'src, 'a> {
    pub(crate) fn parse_block(&mut self) -> Block<'a> {
        self.expect(&TokenKind::LBrace, "expected `{` to start a block");
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement());
        }
        self.expect(&TokenKind::RBrace, "expected `}` to close a block");
        self.arenas.stmt_lists.alloc_slice(stmts)
    }

    fn parse_statement(&mut self) -> Stmt<'a> {
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_block_stmt(),
            TokenKind::Let | TokenKind::Const => self.parse_let_stmt(),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Do => self.parse_do_while_stmt(),
            TokenKind::For => self.parse_for_range_stmt(),
            TokenKind::Switch => self.parse_switch_stmt(),
            TokenKind::Break => self.parse_break_stmt(),
            TokenKind::Continue => self.parse_continue_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_block_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        let body = self.parse_block();
        let span = start.merge(self.previous_span());
        Stmt::Block { body, span, id: self.ids.fresh() }
    }

    fn parse_let_stmt(&mut self) -> Stmt<'a> {
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
        Stmt::Let { name, name_span, is_const, type_annotation, init, span, id: self.ids.fresh() }
    }

    fn parse_if_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        self.advance();
        self.expect(&TokenKind::LParen, "expected `(` after `if`");
        let cond = self.parse_expr();
        self.expect(&TokenKind::RParen, "expected `)` after `if` condition");
        let then_branch = self.parse_block();
        let else_branch = if self.match_tok(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                let nested = self.parse_if_stmt();
                Some(self.arenas.stmt_lists.alloc_slice([nested]))
            } else {
                Some(self.parse_block())
            }
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Stmt::If { cond, then_branch, else_branch, span, id: self.ids.fresh() }
    }

    fn parse_while_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        self.advance();
        self.expect(&TokenKind::LParen, "expected `(` after `while`");
        let cond = self.parse_expr();
        self.expect(&TokenKind::RParen, "expected `)` after `while` condition");
        self.enter_loop();
        let body = self.parse_block();
        self.exit_loop();
        let span = start.merge(self.previous_span());
        Stmt::While { cond, body, span, id: self.ids.fresh() }
    }

    fn parse_do_while_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        self.advance();
        self.enter_loop();
        let body = self.parse_block();
        self.exit_loop();
        self.expect(&TokenKind::While, "expected `while` after `do` block");
        self.expect(&TokenKind::LParen, "expected `(` after `while`");
        let cond = self.parse_expr();
        self.expect(&TokenKind::RParen, "expected `)` after `do-while` condition");
        let semi = self.expect(&TokenKind::Semicolon, "expected `;` after `do-while` statement");
        let span = start.merge(semi.span);
        Stmt::DoWhile { body, cond, span, id: self.ids.fresh() }
    }

    /// The only supported `for` form: `for (id = start to end) body`.
    fn parse_for_range_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        self.advance();
        self.expect(&TokenKind::LParen, "expected `(` after `for`");
        let (var, var_span) = self.expect_identifier("expected a loop variable name");
        self.expect(&TokenKind::Eq, "expected `=` in `for` range header");
        let range_start = self.parse_expr();
        self.expect(&TokenKind::To, "expected `to` in `for` range header");
        let end = self.parse_expr();
        self.expect(&TokenKind::RParen, "expected `)` after `for` range header");
        self.enter_loop();
        let body = self.parse_block();
        self.exit_loop();
        let span = start.merge(self.previous_span());
        Stmt::ForRange { var, var_span, start: range_start, end, body, span, id: self.ids.fresh() }
    }

    fn parse_switch_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        self.advance();
        self.expect(&TokenKind::LParen, "expected `(` after `switch`");
        let scrutinee = self.parse_expr();
        self.expect(&TokenKind::RParen, "expected `)` after `switch` scrutinee");
        self.expect(&TokenKind::LBrace, "expected `{` to start a `switch` body");
        self.enter_switch();
        let mut cases = Vec::new();
        let mut default = None;
        while self.check(&TokenKind::Case) || self.check(&TokenKind::Default) {
            if self.check(&TokenKind::Case) {
                let case_start = self.current_span();
                self.advance();
                let value = self.parse_expr();
                self.expect(&TokenKind::Colon, "expected `:` after `case` value");
                let body = self.parse_case_body();
                let span = case_start.merge(self.previous_span());
                cases.push(SwitchCase { value, body, span });
            } else {
                self.advance();
                self.expect(&TokenKind::Colon, "expected `:` after `default`");
                if default.is_some() {
                    self.error_at("P008", "a `switch` may have at most one `default` case", self.previous_span());
                }
                default = Some(self.parse_case_body());
            }
        }
        self.exit_switch();
        self.expect(&TokenKind::RBrace, "expected `}` to close a `switch` body");
        let span = start.merge(self.previous_span());
        let cases = self.arenas.cases.alloc_slice(cases);
        Stmt::Switch { scrutinee, cases, default, span, id: self.ids.fresh() }
    }

    /// Statements belonging to one `case`/`default` arm: up to (but not
    /// including) the next `case`, `default`, or the closing `}`. There is
    /// no implicit fall-through.
    fn parse_case_body(&mut self) -> Block<'a> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Case) && !self.check(&TokenKind::Default) && !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement());
        }
        self.arenas.stmt_lists.alloc_slice(stmts)
    }

    fn parse_break_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        self.advance();
        if self.flags().in_loop == 0 && self.flags().in_switch == 0 {
            self.error_at("P009", "`break` outside of a loop or `switch`", start);
        }
        let semi = self.expect(&TokenKind::Semicolon, "expected `;` after `break`");
        Stmt::Break { span: start.merge(semi.span), id: self.ids.fresh() }
    }

    fn parse_continue_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        self.advance();
        if self.flags().in_loop == 0 {
            self.error_at("P010", "`continue` outside of a loop", start);
        }
        let semi = self.expect(&TokenKind::Semicolon, "expected `;` after `continue`");
        Stmt::Continue { span: start.merge(semi.span), id: self.ids.fresh() }
    }

    fn parse_return_stmt(&mut self) -> Stmt<'a> {
        let start = self.current_span();
        self.advance();
        let value = if self.check(&TokenKind::Semicolon) { None } else { Some(self.parse_expr()) };
        let semi = self.expect(&TokenKind::Semicolon, "expected `;` after `return`");
        Stmt::Return { value, span: start.merge(semi.span), id: self.ids.fresh() }
    }

    fn parse_expr_stmt(&mut self) -> Stmt<'a> {
        let expr = self.parse_expr();
        let semi = self.expect(&TokenKind::Semicolon, "expected `;` after expression statement");
        Stmt::Expr { expr, span: expr.span().merge(semi.span), id: self.ids.fresh() }
    }
}
