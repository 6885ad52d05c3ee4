//! Lexer: UTF-8 source buffer to spanned token stream.
//!
//! On a lexical failure the lexer emits a [`Diagnostic`], produces an
//! `Error` token for the offending text, and continues scanning — a single
//! bad character never aborts the whole file.

use crate::token::{Token, TokenKind};
use blend65_base::{Diagnostic, DiagnosticSink, Position, Span};

/// Scans `source` into a token stream terminated by `Eof`.
///
/// `origin` is an opaque identifier for diagnostics (e.g. a file path);
/// the lexer itself never performs file I/O.
pub struct Lexer<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
    column: u32,
    diagnostics: DiagnosticSink,
}

const KNOWN_ESCAPES: &[(char, char)] = &[('n', '\n'), ('r', '\r'), ('t', '\t'), ('\\', '\\'), ('"', '"'), ('\'', '\'')];

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            diagnostics: DiagnosticSink::new(),
        }
    }

    /// Scans the whole source, returning the token list (always ending in
    /// `Eof`) and any diagnostics produced along the way.
    pub fn tokenize(mut self) -> (Vec<Token>, DiagnosticSink) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column, self.pos)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance_byte(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn make(&self, kind: TokenKind, start: Position, lexeme: &str) -> Token {
        Token::new(kind, lexeme, Span::new(start, self.here()))
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let start = self.here();

        let Some(b) = self.peek_byte() else {
            return self.make(TokenKind::Eof, start, "");
        };

        match b {
            b'\r' | b'\n' => self.lex_newline(start),
            b'0'..=b'9' => self.lex_number(start),
            b'$' => self.lex_dollar_hex(start),
            b'"' | b'\'' => self.lex_string(start, b),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_identifier(start),
            _ => self.lex_punctuation(start, b),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') => {
                    self.advance_byte();
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'/') => {
                    while !matches!(self.peek_byte(), None | Some(b'\n')) {
                        self.advance_byte();
                    }
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'*') => {
                    let start = self.here();
                    self.advance_byte();
                    self.advance_byte();
                    let mut closed = false;
                    while self.peek_byte().is_some() {
                        if self.peek_byte() == Some(b'*') && self.peek_byte_at(1) == Some(b'/') {
                            self.advance_byte();
                            self.advance_byte();
                            closed = true;
                            break;
                        }
                        self.advance_byte();
                    }
                    if !closed {
                        self.diagnostics.push(Diagnostic::error(
                            "L003",
                            "unterminated block comment",
                            Span::new(start, self.here()),
                        ));
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_newline(&mut self, start: Position) -> Token {
        // CR, LF and CRLF are each a single significant newline token.
        if self.peek_byte() == Some(b'\r') {
            self.advance_byte();
            if self.peek_byte() == Some(b'\n') {
                self.advance_byte();
            }
        } else {
            self.advance_byte();
        }
        self.make(TokenKind::Newline, start, "\n")
    }

    fn lex_number(&mut self, start: Position) -> Token {
        // binary: 0b...
        if self.peek_byte() == Some(b'0') && matches!(self.peek_byte_at(1), Some(b'b') | Some(b'B')) {
            self.advance_byte();
            self.advance_byte();
            let digits_start = self.pos;
            while matches!(self.peek_byte(), Some(b'0') | Some(b'1')) {
                self.advance_byte();
            }
            let digits = &self.source[digits_start..self.pos];
            if digits.is_empty() {
                self.diagnostics.push(Diagnostic::error("L002", "invalid binary literal: at least one binary digit is required", Span::new(start, self.here())));
                return self.make(TokenKind::Error, start, &self.source[start.offset..self.pos]);
            }
            return match u32::from_str_radix(digits, 2) {
                Ok(v) if v <= 65535 => self.make(TokenKind::BinaryNumber(v), start, &self.source[start.offset..self.pos]),
                _ => {
                    self.diagnostics.push(Diagnostic::error("L002", "invalid binary literal: value exceeds 65535", Span::new(start, self.here())));
                    self.make(TokenKind::Error, start, &self.source[start.offset..self.pos])
                }
            };
        }
        // hex: 0x...
        if self.peek_byte() == Some(b'0') && matches!(self.peek_byte_at(1), Some(b'x') | Some(b'X')) {
            self.advance_byte();
            self.advance_byte();
            return self.finish_hex(start);
        }
        // decimal
        let digits_start = self.pos;
        while matches!(self.peek_byte(), Some(b'0'..=b'9')) {
            self.advance_byte();
        }
        let digits = &self.source[digits_start..self.pos];
        match digits.parse::<u64>() {
            Ok(v) if v <= 65535 => self.make(TokenKind::DecimalNumber(v as u32), start, &self.source[start.offset..self.pos]),
            _ => {
                self.diagnostics.push(Diagnostic::error("L001", "decimal literal out of range: values must fit in 0..=65535", Span::new(start, self.here())));
                self.make(TokenKind::Error, start, &self.source[start.offset..self.pos])
            }
        }
    }

    /// Lexes a `$FFFF`-style hex literal (the `$` itself is the prefix).
    fn lex_dollar_hex(&mut self, start: Position) -> Token {
        self.advance_byte(); // consume '$'
        self.finish_hex(start)
    }

    fn finish_hex(&mut self, start: Position) -> Token {
        let digits_start = self.pos;
        while matches!(self.peek_byte(), Some(b'0'..=b'9') | Some(b'a'..=b'f') | Some(b'A'..=b'F')) {
            self.advance_byte();
        }
        let digits = &self.source[digits_start..self.pos];
        if digits.is_empty() {
            self.diagnostics.push(Diagnostic::error("L001", "invalid hex literal: at least one hex digit is required", Span::new(start, self.here())));
            return self.make(TokenKind::Error, start, &self.source[start.offset..self.pos]);
        }
        match u32::from_str_radix(digits, 16) {
            Ok(v) if v <= 65535 => self.make(TokenKind::HexNumber(v), start, &self.source[start.offset..self.pos]),
            _ => {
                self.diagnostics.push(Diagnostic::error("L001", "invalid hex literal: value exceeds 65535", Span::new(start, self.here())));
                self.make(TokenKind::Error, start, &self.source[start.offset..self.pos])
            }
        }
    }

    fn lex_string(&mut self, start: Position, quote: u8) -> Token {
        self.advance_byte(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_byte() {
                None | Some(b'\n') => {
                    self.diagnostics.push(Diagnostic::error("L004", "unterminated string literal", Span::new(start, self.here())));
                    return self.make(TokenKind::Error, start, &self.source[start.offset..self.pos]);
                }
                Some(b) if b == quote => {
                    self.advance_byte();
                    break;
                }
                Some(b'\\') => {
                    self.advance_byte();
                    match self.peek_byte() {
                        Some(c) => {
                            let ch = c as char;
                            if let Some((_, escaped)) = KNOWN_ESCAPES.iter().find(|(k, _)| *k == ch) {
                                value.push(*escaped);
                            } else {
                                // Unknown escapes pass through unchanged.
                                value.push('\\');
                                value.push(ch);
                            }
                            self.advance_byte();
                        }
                        None => {
                            self.diagnostics.push(Diagnostic::error("L004", "unterminated string literal", Span::new(start, self.here())));
                            return self.make(TokenKind::Error, start, &self.source[start.offset..self.pos]);
                        }
                    }
                }
                Some(_) => {
                    // Re-decode as UTF-8 so multi-byte characters survive.
                    let rest = &self.source[self.pos..];
                    let ch = rest.chars().next().unwrap();
                    value.push(ch);
                    for _ in 0..ch.len_utf8() {
                        self.advance_byte();
                    }
                }
            }
        }
        let lexeme = self.source[start.offset..self.pos].to_string();
        self.make(TokenKind::StringLiteral(value), start, &lexeme)
    }

    fn lex_identifier(&mut self, start: Position) -> Token {
        while matches!(self.peek_byte(), Some(b'a'..=b'z') | Some(b'A'..=b'Z') | Some(b'0'..=b'9') | Some(b'_')) {
            self.advance_byte();
        }
        let text = &self.source[start.offset..self.pos];
        let kind = TokenKind::keyword_for(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        self.make(kind, start, text)
    }

    fn lex_punctuation(&mut self, start: Position, b: u8) -> Token {
        macro_rules! two {
            ($second:expr, $two_kind:expr, $one_kind:expr) => {{
                self.advance_byte();
                if self.peek_byte() == Some($second) {
                    self.advance_byte();
                    self.make($two_kind, start, &self.source[start.offset..self.pos])
                } else {
                    self.make($one_kind, start, &self.source[start.offset..self.pos])
                }
            }};
        }

        match b {
            b'+' => { self.advance_byte(); self.make(TokenKind::Plus, start, "+") }
            b'-' => { self.advance_byte(); self.make(TokenKind::Minus, start, "-") }
            b'*' => { self.advance_byte(); self.make(TokenKind::Star, start, "*") }
            b'/' => { self.advance_byte(); self.make(TokenKind::Slash, start, "/") }
            b'%' => { self.advance_byte(); self.make(TokenKind::Percent, start, "%") }
            b'^' => { self.advance_byte(); self.make(TokenKind::Caret, start, "^") }
            b'~' => { self.advance_byte(); self.make(TokenKind::Tilde, start, "~") }
            b'?' => { self.advance_byte(); self.make(TokenKind::Question, start, "?") }
            b':' => { self.advance_byte(); self.make(TokenKind::Colon, start, ":") }
            b';' => { self.advance_byte(); self.make(TokenKind::Semicolon, start, ";") }
            b',' => { self.advance_byte(); self.make(TokenKind::Comma, start, ",") }
            b'.' => { self.advance_byte(); self.make(TokenKind::Dot, start, ".") }
            b'(' => { self.advance_byte(); self.make(TokenKind::LParen, start, "(") }
            b')' => { self.advance_byte(); self.make(TokenKind::RParen, start, ")") }
            b'{' => { self.advance_byte(); self.make(TokenKind::LBrace, start, "{") }
            b'}' => { self.advance_byte(); self.make(TokenKind::RBrace, start, "}") }
            b'[' => { self.advance_byte(); self.make(TokenKind::LBracket, start, "[") }
            b']' => { self.advance_byte(); self.make(TokenKind::RBracket, start, "]") }
            b'&' => two!(b'&', TokenKind::AmpAmp, TokenKind::Amp),
            b'|' => two!(b'|', TokenKind::PipePipe, TokenKind::Pipe),
            b'=' => two!(b'=', TokenKind::EqEq, TokenKind::Eq),
            b'!' => two!(b'=', TokenKind::BangEq, TokenKind::Bang),
            b'<' => {
                self.advance_byte();
                match self.peek_byte() {
                    Some(b'=') => { self.advance_byte(); self.make(TokenKind::LtEq, start, "<=") }
                    Some(b'<') => { self.advance_byte(); self.make(TokenKind::Shl, start, "<<") }
                    _ => self.make(TokenKind::Lt, start, "<"),
                }
            }
            b'>' => {
                self.advance_byte();
                match self.peek_byte() {
                    Some(b'=') => { self.advance_byte(); self.make(TokenKind::GtEq, start, ">=") }
                    Some(b'>') => { self.advance_byte(); self.make(TokenKind::Shr, start, ">>") }
                    _ => self.make(TokenKind::Gt, start, ">"),
                }
            }
            _ => {
                let rest = &self.source[self.pos..];
                let ch = rest.chars().next().unwrap();
                for _ in 0..ch.len_utf8() {
                    self.advance_byte();
                }
                self.diagnostics.push(Diagnostic::error("L005", format!("unexpected character '{ch}'"), Span::new(start, self.here())));
                self.make(TokenKind::Error, start, &ch.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, diags) = Lexer::new(src).tokenize();
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags.into_vec());
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_decimal_hex_and_binary_literals() {
        assert_eq!(kinds("255"), vec![TokenKind::DecimalNumber(255), TokenKind::Eof]);
        assert_eq!(kinds("$FFFF"), vec![TokenKind::HexNumber(0xFFFF), TokenKind::Eof]);
        assert_eq!(kinds("0xFF"), vec![TokenKind::HexNumber(0xFF), TokenKind::Eof]);
        assert_eq!(kinds("0b1010"), vec![TokenKind::BinaryNumber(0b1010), TokenKind::Eof]);
    }

    #[test]
    fn decimal_overflow_is_an_error() {
        let (tokens, diags) = Lexer::new("65536").tokenize();
        assert!(diags.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::Error);
    }

    #[test]
    fn keywords_and_identifiers_are_distinguished() {
        assert_eq!(kinds("let x"), vec![TokenKind::Let, TokenKind::Identifier("x".into()), TokenKind::Eof]);
    }

    #[test]
    fn block_comments_do_not_nest() {
        // The inner `/*` is just text; the first `*/` closes the comment.
        let src = "/* outer /* inner */ x";
        let (tokens, diags) = Lexer::new(src).tokenize();
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Identifier("x".into()));
    }

    #[test]
    fn unterminated_string_errors_at_opening_quote() {
        let (_, diags) = Lexer::new("\"abc").tokenize();
        assert!(diags.has_errors());
        let d = diags.into_vec().into_iter().next().unwrap();
        assert_eq!(d.primary_span.start.offset, 0);
    }

    #[test]
    fn string_escapes_are_decoded() {
        let (tokens, _) = Lexer::new("\"a\\nb\"").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("a\nb".into()));
    }

    #[test]
    fn unknown_escape_passes_through() {
        let (tokens, _) = Lexer::new("\"a\\qb\"").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("a\\qb".into()));
    }

    #[test]
    fn every_non_eof_token_has_nonempty_span() {
        let (tokens, _) = Lexer::new("module test; let x: byte = 42;").tokenize();
        for t in &tokens {
            if t.kind != TokenKind::Eof {
                assert!(t.span.start.offset < t.span.end.offset, "{:?}", t);
            }
        }
    }
}
