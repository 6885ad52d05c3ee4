//! Pratt expression parser.
//!
//! Precedence, lowest to highest: assignment (right-assoc) < ternary <
//! `||` < `&&` < `|` < `^` < `&` < equality < relational < shift <
//! additive < multiplicative < unary < postfix (call/index/member) <
//! primary. Assignment and ternary sit outside the binary-operator table
//! and are handled by dedicated entry points, matching the grammar's
//! "assignment is lowest precedence, right-associative" rule.

use crate::Parser;
use blend65_ast::{BinaryOp, Expr, UnaryOp};
use blend65_lexer::TokenKind;

#[derive(Clone, Copy, PartialEq, PartialOrd)]
enum Prec {
    None,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
}

fn binop_for(kind: &TokenKind) -> Option<(BinaryOp, Prec)> {
    use BinaryOp as B;
    use Prec as P;
    Some(match kind {
        TokenKind::PipePipe => (B::Or, P::Or),
        TokenKind::AmpAmp => (B::And, P::And),
        TokenKind::Pipe => (B::BitOr, P::BitOr),
        TokenKind::Caret => (B::BitXor, P::BitXor),
        TokenKind::Amp => (B::BitAnd, P::BitAnd),
        TokenKind::EqEq => (B::Eq, P::Equality),
        TokenKind::BangEq => (B::NotEq, P::Equality),
        TokenKind::Lt => (B::Lt, P::Relational),
        TokenKind::LtEq => (B::LtEq, P::Relational),
        TokenKind::Gt => (B::Gt, P::Relational),
        TokenKind::GtEq => (B::GtEq, P::Relational),
        TokenKind::Shl => (B::Shl, P::Shift),
        TokenKind::Shr => (B::Shr, P::Shift),
        TokenKind::Plus => (B::Add, P::Additive),
        TokenKind::Minus => (B::Sub, P::Additive),
        TokenKind::Star => (B::Mul, P::Multiplicative),
        TokenKind::Slash => (B::Div, P::Multiplicative),
        TokenKind::Percent => (B::Mod, P::Multiplicative),
        _ => return None,
    })
}

impl<'src, 'a> Parser<'src, 'a> {
    pub(crate) fn parse_expr(&mut self) -> &'a Expr<'a> {
        self.parse_assignment()
    }

    /// Lowest precedence, right-associative: `lhs = rhs`.
    fn parse_assignment(&mut self) -> &'a Expr<'a> {
        let target = self.parse_ternary();
        if self.check(&TokenKind::Eq) {
            self.advance();
            let value = self.parse_assignment();
            let span = target.span().merge(value.span());
            if !target.is_assignable() {
                self.error_at("P005", "left-hand side of assignment is not assignable", target.span());
            }
            return self.alloc_expr(Expr::Assign { target, value, span, id: self.ids.fresh() });
        }
        target
    }

    fn parse_ternary(&mut self) -> &'a Expr<'a> {
        let cond = self.parse_binary(Prec::Or);
        if self.check(&TokenKind::Question) {
            self.advance();
            let then_branch = self.parse_assignment();
            self.expect(&TokenKind::Colon, "expected `:` in ternary expression");
            let else_branch = self.parse_assignment();
            let span = cond.span().merge(else_branch.span());
            return self.alloc_expr(Expr::Ternary { cond, then_branch, else_branch, span, id: self.ids.fresh() });
        }
        cond
    }

    fn parse_binary(&mut self, min_prec: Prec) -> &'a Expr<'a> {
        let mut left = self.parse_unary();
        loop {
            let Some((op, prec)) = binop_for(self.peek_kind()) else { break };
            if prec < min_prec {
                break;
            }
            self.advance();
            let next_min = match prec {
                Prec::Or => Prec::And,
                Prec::And => Prec::BitOr,
                Prec::BitOr => Prec::BitXor,
                Prec::BitXor => Prec::BitAnd,
                Prec::BitAnd => Prec::Equality,
                Prec::Equality => Prec::Relational,
                Prec::Relational => Prec::Shift,
                Prec::Shift => Prec::Additive,
                Prec::Additive => Prec::Multiplicative,
                Prec::Multiplicative => Prec::None,
                Prec::None => Prec::None,
            };
            // Left-associative: the recursive call requires strictly
            // higher precedence than the operator just consumed.
            let right = self.parse_binary(next_min);
            let span = left.span().merge(right.span());
            left = self.alloc_expr(Expr::Binary { op, left, right, span, id: self.ids.fresh() });
        }
        left
    }

    fn parse_unary(&mut self) -> &'a Expr<'a> {
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_unary();
            let span = start.merge(operand.span());
            return self.alloc_expr(Expr::Unary { op, operand, span, id: self.ids.fresh() });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> &'a Expr<'a> {
        let mut expr = self.parse_primary();
        loop {
            expr = match self.peek_kind() {
                TokenKind::LParen => self.parse_call(expr),
                TokenKind::LBracket => self.parse_index(expr),
                TokenKind::Dot => self.parse_member(expr),
                _ => break,
            };
        }
        expr
    }

    fn parse_call(&mut self, callee_expr: &'a Expr<'a>) -> &'a Expr<'a> {
        let (callee, callee_span) = match callee_expr {
            Expr::Identifier { name, span, .. } => (*name, *span),
            other => {
                self.error_at("P006", "only plain function names can be called", other.span());
                (self.interner.intern(""), other.span())
            }
        };
        self.advance(); // (
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr());
                if !self.match_tok(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(&TokenKind::RParen, "expected `)` after call arguments");
        let span = callee_span.merge(close.span);
        let args = self.arenas.expr_refs.alloc_slice(args);
        self.alloc_expr(Expr::Call { callee, callee_span, args, span, id: self.ids.fresh() })
    }

    fn parse_index(&mut self, base: &'a Expr<'a>) -> &'a Expr<'a> {
        self.advance(); // [
        let index = self.parse_expr();
        let close = self.expect(&TokenKind::RBracket, "expected `]` after index expression");
        let span = base.span().merge(close.span);
        self.alloc_expr(Expr::Index { base, index, span, id: self.ids.fresh() })
    }

    fn parse_member(&mut self, base: &'a Expr<'a>) -> &'a Expr<'a> {
        self.advance(); // .
        let (member, member_span) = self.expect_identifier("expected a member name after `.`");
        let span = base.span().merge(member_span);
        self.alloc_expr(Expr::Member { base, member, span, id: self.ids.fresh() })
    }

    fn parse_primary(&mut self) -> &'a Expr<'a> {
        let span = self.current_span();
        match self.peek().kind.clone() {
            TokenKind::DecimalNumber(n) | TokenKind::HexNumber(n) | TokenKind::BinaryNumber(n) => {
                self.advance();
                self.alloc_expr(Expr::Number { value: n, span, id: self.ids.fresh() })
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                let value = self.interner.intern(&s);
                self.alloc_expr(Expr::Str { value, span, id: self.ids.fresh() })
            }
            TokenKind::True => {
                self.advance();
                self.alloc_expr(Expr::Bool { value: true, span, id: self.ids.fresh() })
            }
            TokenKind::False => {
                self.advance();
                self.alloc_expr(Expr::Bool { value: false, span, id: self.ids.fresh() })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                let name = self.interner.intern(&name);
                self.alloc_expr(Expr::Identifier { name, span, id: self.ids.fresh() })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(&TokenKind::RParen, "expected `)` after parenthesized expression");
                inner
            }
            TokenKind::LBracket => self.parse_array_literal(),
            _ => {
                self.error_at("P001", "expected an expression", span);
                // Do not advance: let synchronize()/the caller's loop make
                // forward progress, matching expect()'s non-advancing
                // contract for synthetic results.
                self.alloc_expr(Expr::Error { span, id: self.ids.fresh() })
            }
        }
    }

    fn parse_array_literal(&mut self) -> &'a Expr<'a> {
        let start = self.current_span();
        self.advance(); // [
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expr());
                if !self.match_tok(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(&TokenKind::RBracket, "expected `]` after array literal");
        let span = start.merge(close.span);
        let elements = self.arenas.expr_refs.alloc_slice(elements);
        self.alloc_expr(Expr::ArrayLiteral { elements, span, id: self.ids.fresh() })
    }

    pub(crate) fn alloc_expr(&self, expr: Expr<'a>) -> &'a Expr<'a> {
        self.arenas.exprs.alloc(expr)
    }
}
