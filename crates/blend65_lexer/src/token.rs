//! Token vocabulary for blend65 source.

use blend65_base::Span;
use std::fmt;

/// The lexical category of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Module,
    Import,
    From,
    As,
    Export,
    Function,
    Let,
    Const,
    If,
    Else,
    While,
    For,
    To,
    Do,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    True,
    False,

    // Type names (recognized contextually by the parser, lexed as identifiers
    // unless they exactly match a reserved primitive name)
    TypeByte,
    TypeWord,
    TypeBool,
    TypeBoolean,
    TypeVoid,
    TypeString,
    TypeCallback,

    // Literals
    DecimalNumber(u32),
    HexNumber(u32),
    BinaryNumber(u32),
    StringLiteral(String),

    // Identifier
    Identifier(String),

    // Punctuation / operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    AmpAmp,
    PipePipe,
    Bang,
    EqEq,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    Question,
    Colon,
    Semicolon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    /// A significant newline, used by the parser for elided-semicolon
    /// statement termination.
    Newline,

    /// A lexical error: an invalid token was produced but the lexer
    /// continued past it.
    Error,

    Eof,
}

impl TokenKind {
    /// Returns the keyword `TokenKind` matching an identifier-shaped
    /// lexeme exactly, or `None` if the text is an ordinary identifier.
    pub fn keyword_for(text: &str) -> Option<TokenKind> {
        Some(match text {
            "module" => TokenKind::Module,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "export" => TokenKind::Export,
            "function" => TokenKind::Function,
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "to" => TokenKind::To,
            "do" => TokenKind::Do,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "byte" => TokenKind::TypeByte,
            "word" => TokenKind::TypeWord,
            "bool" => TokenKind::TypeBool,
            "boolean" => TokenKind::TypeBoolean,
            "void" => TokenKind::TypeVoid,
            "string" => TokenKind::TypeString,
            "callback" => TokenKind::TypeCallback,
            _ => return None,
        })
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, TokenKind::Eof)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "identifier `{name}`"),
            TokenKind::DecimalNumber(n) => write!(f, "number {n}"),
            TokenKind::HexNumber(n) => write!(f, "hex number {n:#X}"),
            TokenKind::BinaryNumber(n) => write!(f, "binary number {n:#b}"),
            TokenKind::StringLiteral(s) => write!(f, "string {s:?}"),
            TokenKind::Eof => write!(f, "end of file"),
            TokenKind::Newline => write!(f, "newline"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A lexed token: its kind, the exact source slice it came from, and the
/// span it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self { kind, lexeme: lexeme.into(), span }
    }
}
