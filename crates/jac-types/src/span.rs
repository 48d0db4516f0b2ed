use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location span.
///
/// Lines and columns are 1-based. Runtime error messages only use the
/// start position (`line X, col Y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Zero-width span at a single position.
    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        let (start_line, start_col) =
            (self.start_line, self.start_col).min((other.start_line, other.start_col));
        let (end_line, end_col) =
            (self.end_line, self.end_col).max((other.end_line, other.end_col));
        Span::new(start_line, start_col, end_line, end_col)
    }

    /// True for the default (unknown) location.
    pub fn is_unknown(&self) -> bool {
        self.start_line == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// A named piece of Jac source text.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// Source line by 1-based number, without its line terminator.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = line_number.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&s| s.saturating_sub(1))
            .unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset of a 1-based line/column position.
    pub fn offset_of(&self, line: u32, col: u32) -> usize {
        let idx = (line.max(1) - 1) as usize;
        let start = self
            .line_starts
            .get(idx)
            .copied()
            .unwrap_or(self.source.len());
        (start + col.max(1) as usize - 1).min(self.source.len())
    }

    /// Source text covered by `span` (end column inclusive).
    pub fn snippet(&self, span: Span) -> &str {
        let start = self.offset_of(span.start_line, span.start_col);
        let end = (self.offset_of(span.end_line, span.end_col) + 1).min(self.source.len());
        self.source.get(start..end.max(start)).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge_across_lines() {
        let a = Span::new(1, 5, 1, 10);
        let b = Span::new(2, 3, 2, 8);
        assert_eq!(a.merge(b), Span::new(1, 5, 2, 8));
        assert_eq!(b.merge(a), Span::new(1, 5, 2, 8));
    }

    #[test]
    fn test_span_merge_same_line() {
        let merged = Span::new(1, 5, 1, 10).merge(Span::new(1, 3, 1, 8));
        assert_eq!(merged.start_col, 3);
        assert_eq!(merged.end_col, 10);
    }

    #[test]
    fn test_span_display_and_unknown() {
        assert_eq!(Span::new(3, 7, 3, 15).to_string(), "3:7");
        assert!(Span::default().is_unknown());
        assert!(!Span::point(1, 1).is_unknown());
    }

    #[test]
    fn test_source_file_lines() {
        let src = SourceFile::new("g.jac", "node person {\r\n  has name;\r\n}");
        assert_eq!(src.line(1), Some("node person {"));
        assert_eq!(src.line(2), Some("  has name;"));
        assert_eq!(src.line(3), Some("}"));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
        assert_eq!(src.line_count(), 3);
    }

    #[test]
    fn test_source_file_snippet() {
        let src = SourceFile::new("g.jac", "walker init {\n  report 5;\n}");
        assert_eq!(src.snippet(Span::new(2, 3, 2, 8)), "report");
        assert_eq!(src.snippet(Span::new(1, 1, 1, 6)), "walker");
    }

    #[test]
    fn test_source_file_empty() {
        let src = SourceFile::new("empty.jac", "");
        assert_eq!(src.line_count(), 1);
        assert_eq!(src.line(1), Some(""));
        assert_eq!(src.snippet(Span::point(1, 1)), "");
    }
}
