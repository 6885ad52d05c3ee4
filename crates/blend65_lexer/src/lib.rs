//! # blend65_lexer
//!
//! Scans blend65 source text into a spanned token stream.
//! Lexical failures emit a [`blend65_base::Diagnostic`] and continue
//! scanning rather than aborting; the caller always gets back a complete
//! token stream ending in `Eof`.

pub mod lexer;
pub mod token;

pub use lexer::Lexer;
pub use token::{Token, TokenKind};
