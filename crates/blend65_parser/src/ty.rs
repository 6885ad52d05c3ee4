//! Type annotation parsing.

use crate::Parser;
use blend65_ast::{ArrayLen, TypeExpr};
use blend65_lexer::TokenKind;

impl<'src, 'a> Parser<'src, 'a> {
    /// `byte` | `word` | `bool` | `boolean` | `void` | `string` | `callback`
    /// | identifier, followed by zero or more `[n]`/`[]` suffixes read
    /// left to right.
    pub(crate) fn parse_type_annotation(&mut self) -> TypeExpr<'a> {
        let (name, span) = match self.peek().kind.clone() {
            TokenKind::TypeByte
            | TokenKind::TypeWord
            | TokenKind::TypeBool
            | TokenKind::TypeBoolean
            | TokenKind::TypeVoid
            | TokenKind::TypeString
            | TokenKind::TypeCallback => {
                let tok = self.advance();
                (self.interner.intern(&tok.lexeme), tok.span)
            }
            TokenKind::Identifier(name) => {
                let span = self.current_span();
                self.advance();
                (self.interner.intern(&name), span)
            }
            _ => {
                let span = self.current_span();
                self.error_at("P001", "expected a type annotation", span);
                (self.interner.intern(""), span)
            }
        };
        let mut ty = TypeExpr::Named { name, span };
        while self.check(&TokenKind::LBracket) {
            let start = self.current_span();
            self.advance();
            let (len, end) = if self.check(&TokenKind::RBracket) {
                let end = self.current_span();
                (ArrayLen::Inferred, end)
            } else if let TokenKind::DecimalNumber(n) = self.peek().kind.clone() {
                let end = self.current_span();
                self.advance();
                (ArrayLen::Fixed(n), end)
            } else {
                let end = self.current_span();
                self.error_at("P001", "expected an array length or `]`", end);
                (ArrayLen::Inferred, end)
            };
            let close = self.expect(&TokenKind::RBracket, "expected `]` after array length");
            let full = start.merge(end).merge(close.span);
            let element = self.arenas.types.alloc(ty);
            ty = TypeExpr::Array { element, len, span: full };
        }
        ty
    }
}
