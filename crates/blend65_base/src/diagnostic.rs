//! Structured diagnostics: errors, warnings, info and hints with stable
//! codes, spans, related locations and suggested fixes.
//!
//! Every phase of the pipeline accumulates [`Diagnostic`]s into a
//! [`DiagnosticSink`] rather than returning `Result::Err` for user-facing
//! problems. Codes are grouped by phase: `P*` parser, `S*`
//! semantic, `W*` warning, `H*` hint. Codes are a stable contract; message
//! text is not.

use crate::span::Span;
use std::fmt;

/// Severity of a diagnostic. Only `Error` affects a host's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Hint,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        write!(f, "{s}")
    }
}

/// A single proposed edit: replace the text at `span` with `new_text`.
#[derive(Debug, Clone)]
pub struct Edit {
    pub span: Span,
    pub new_text: String,
}

/// A suggested fix: a human description plus the edits that apply it.
#[derive(Debug, Clone)]
pub struct Fix {
    pub description: String,
    pub edits: Vec<Edit>,
}

/// A secondary location related to a diagnostic (e.g. "first declared
/// here" for a duplicate-declaration error).
#[derive(Debug, Clone)]
pub struct RelatedInfo {
    pub span: Span,
    pub message: String,
}

/// A structured diagnostic record.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub primary_span: Span,
    pub related: Vec<RelatedInfo>,
    pub fixes: Vec<Fix>,
}

impl Diagnostic {
    pub fn new(code: &'static str, severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            primary_span: span,
            related: Vec::new(),
            fixes: Vec::new(),
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, Severity::Error, message, span)
    }

    pub fn warning(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, Severity::Warning, message, span)
    }

    pub fn hint(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, Severity::Hint, message, span)
    }

    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(RelatedInfo { span, message: message.into() });
        self
    }

    pub fn with_fix(mut self, description: impl Into<String>, edits: Vec<Edit>) -> Self {
        self.fixes.push(Fix { description: description.into(), edits });
        self
    }

    /// Renders a single-line-excerpt-with-caret view, in the style of
    /// `rustc`'s terminal diagnostics. `source` must be the same buffer the
    /// diagnostic's span offsets were computed against.
    pub fn render(&self, source: &str) -> String {
        let line_no = self.primary_span.start.line as usize;
        let col = self.primary_span.start.column as usize;
        let line_text = source.lines().nth(line_no.saturating_sub(1)).unwrap_or("");
        let caret_len = self.primary_span.len().max(1);
        let mut out = format!("{}[{}]: {}\n", self.severity, self.code, self.message);
        out += &format!("  --> {}:{}\n", self.primary_span.start, "");
        out += &format!("   |\n{:>3}| {}\n   | {}{}\n", line_no, line_text, " ".repeat(col.saturating_sub(1)), "^".repeat(caret_len));
        for rel in &self.related {
            out += &format!("note: {} ({})\n", rel.message, rel.span);
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {} ({})", self.severity, self.code, self.message, self.primary_span)
    }
}

/// An accumulating sink of diagnostics for a single compilation phase or
/// whole compilation. Never aborts on push; callers decide whether to stop
/// proceeding to the next phase based on [`DiagnosticSink::has_errors`].
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Appends another sink's diagnostics in order, preserving the
    /// deterministic source-order / dependency-topological-order contract.
    pub fn extend(&mut self, other: DiagnosticSink) {
        self.diagnostics.extend(other.diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    fn span(offset: usize, len: usize) -> Span {
        Span::new(Position::new(1, offset as u32 + 1, offset), Position::new(1, (offset + len) as u32 + 1, offset + len))
    }

    #[test]
    fn sink_reports_errors_present() {
        let mut sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        sink.push(Diagnostic::warning("W001", "unused import", span(0, 3)));
        assert!(!sink.has_errors());
        sink.push(Diagnostic::error("S001", "undefined variable", span(4, 1)));
        assert!(sink.has_errors());
    }

    #[test]
    fn extend_preserves_order() {
        let mut a = DiagnosticSink::new();
        a.push(Diagnostic::error("P001", "a", span(0, 1)));
        let mut b = DiagnosticSink::new();
        b.push(Diagnostic::error("P001", "b", span(1, 1)));
        a.extend(b);
        let msgs: Vec<_> = a.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(msgs, vec!["a", "b"]);
    }
}
