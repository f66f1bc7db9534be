/*!
# Source position types (Position, Span)

Parse trees carry byte offsets only; line and column are computed on demand
through a [`LineIndex`] built over the same text.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Position in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }

    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Span in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Line index for fast offset->(line,column) mapping.
///
/// Columns are counted in characters, not bytes, so Cyrillic identifiers
/// report the column an editor shows.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets where each line starts.
    line_starts: Arc<Vec<usize>>, // Arc для дешёвого клонирования
    text: Arc<str>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = Vec::with_capacity(text.len() / 32 + 1);
        starts.push(0usize);
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self {
            line_starts: Arc::new(starts),
            text: Arc::from(text),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        // Бинарный поиск последнего line_start <= offset
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insert_at) => insert_at - 1,
        };
        let line_start = self.line_starts[line];
        let column = self
            .text
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);
        Position::new(line, column, offset)
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.to_position(start), self.to_position(end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_basic() {
        let text = "line1\nline2\nlast";
        let idx = LineIndex::new(text);
        assert_eq!(idx.line_count(), 3);
        let p = idx.to_position(7); // 'i' in line2
        assert_eq!(p.line, 1);
        assert_eq!(p.column, 1);
    }

    #[test]
    fn test_cyrillic_columns_are_characters() {
        let text = "А = 1;\nББ = 2;";
        let idx = LineIndex::new(text);
        let offset = text.find('=').unwrap();
        assert_eq!(idx.to_position(offset).column, 2);
        let second = text.rfind('=').unwrap();
        let p = idx.to_position(second);
        assert_eq!((p.line, p.column), (1, 3));
        assert_eq!(p.to_string(), "2:4");
    }

    #[test]
    fn test_span_end_clamped() {
        let idx = LineIndex::new("ab\ncd");
        let span = idx.span(3, 100);
        assert_eq!(span.start.line, 1);
        assert_eq!(span.end.column, 2);
    }
}
