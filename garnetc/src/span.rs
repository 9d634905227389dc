//! Source span and location tracking.
//!
//! Spans are attached to normalized AST nodes by the front end and carried
//! through binding nodes so that resolution errors can point back at source.

use serde::{Deserialize, Serialize};

/// A span representing a contiguous region in source code.
///
/// Spans are byte offsets into the source text, along with cached
/// line/column information for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start (inclusive).
    pub start: usize,
    /// Byte offset of the end (exclusive).
    pub end: usize,
    /// 1-indexed line number of the start.
    pub start_line: u32,
    /// 1-indexed column number of the start.
    pub start_col: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize, start_line: u32, start_col: u32) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
        }
    }

    /// Create a dummy span for synthesized code.
    pub fn dummy() -> Self {
        Self {
            start: 0,
            end: 0,
            start_line: 0,
            start_col: 0,
        }
    }

    /// Whether this span was produced for synthesized code.
    pub fn is_dummy(&self) -> bool {
        self.start_line == 0 && self.start == 0 && self.end == 0
    }

    /// The length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one that covers both.
    pub fn merge(self, other: Span) -> Span {
        let start = self.start.min(other.start);
        let end = self.end.max(other.end);
        let (start_line, start_col) = if self.start <= other.start {
            (self.start_line, self.start_col)
        } else {
            (other.start_line, other.start_col)
        };
        Span {
            start,
            end,
            start_line,
            start_col,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}
