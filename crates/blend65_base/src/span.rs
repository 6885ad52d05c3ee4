//! Source location tracking for error reporting.
//!
//! A [`Position`] is a (line, column, byte offset) triple; a [`Span`] is a
//! half-open `[start, end)` range over positions. Spans are attached to
//! every token, AST node, IL instruction and diagnostic so that errors can
//! point at exact source locations. Spans are mergeable: the span of a
//! compound expression is the merge of its children's spans.

use std::cmp::Ordering;

/// A single point in source text: 1-based line and column, 0-based byte
/// offset. Line/column exist purely for human-facing rendering; all
/// comparisons and merges operate on `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl Position {
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self { line, column, offset }
    }

    pub const START: Position = Position { line: 1, column: 1, offset: 0 };
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset.cmp(&other.offset)
    }
}

/// A half-open `[start, end)` range in source text.
///
/// Spans are `Copy` and cheap to pass around; use [`Span::merge`] when
/// combining the spans of sub-expressions into the span of a parent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width span at a single position, used for synthetic tokens
    /// produced by the parser's error-recovery path.
    pub fn point(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }

    /// Combines two spans into the smallest span containing both.
    pub fn merge(self, other: Span) -> Span {
        let start = if self.start.offset <= other.start.offset { self.start } else { other.start };
        let end = if self.end.offset >= other.end.offset { self.end } else { other.end };
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.start.offset >= self.end.offset
    }

    /// Extracts the spanned text from `source`, given `source` is the same
    /// buffer the span's offsets were computed against.
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start.offset..self.end.offset]
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_takes_min_start_max_end() {
        let a = Span::new(Position::new(1, 1, 5), Position::new(1, 6, 10));
        let b = Span::new(Position::new(1, 4, 8), Position::new(1, 11, 15));
        let merged = a.merge(b);
        assert_eq!(merged.start.offset, 5);
        assert_eq!(merged.end.offset, 15);
    }

    #[test]
    fn point_span_is_empty() {
        let p = Position::new(2, 3, 20);
        assert!(Span::point(p).is_empty());
    }

    #[test]
    fn text_extracts_slice() {
        let source = "let x = 1;";
        let span = Span::new(Position::new(1, 1, 0), Position::new(1, 4, 3));
        assert_eq!(span.text(source), "let");
    }
}
