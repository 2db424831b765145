//! Source positions as byte offsets.
//!
//! The frontend never re-scans source text while compiling: every tree
//! node carries a half-open byte [`Span`], and line/column pairs are
//! derived only at diagnostic time through a [`LineIndex`].

use serde::Serialize;

/// A half-open byte range `[start, end)` into one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// The span carried by synthesized expressions: zero bytes at offset 0.
    pub const ZERO: Span = Span { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "backwards span: {start}..{end}");
        Span { start, end }
    }

    /// Extent in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The smallest span that encloses both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Byte offsets of every newline in one source file, supporting
/// on-demand line/column lookup.
///
/// Lines and columns are 1-based; a column counts bytes from the line
/// start, and a newline byte still belongs to the line it terminates.
/// Text after the final newline counts as one more (unterminated) line.
#[derive(Debug)]
pub struct LineIndex {
    newlines: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let newlines = source
            .bytes()
            .enumerate()
            .filter(|&(_, byte)| byte == b'\n')
            .map(|(offset, _)| offset as u32)
            .collect();
        LineIndex { newlines }
    }

    /// The 1-based line and byte column of an offset.
    ///
    /// A binary search for `offset` among the newline positions yields,
    /// in both the hit and miss cases, the count of newlines strictly
    /// before it -- which is exactly the number of completed lines.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let completed = match self.newlines.binary_search(&offset) {
            Ok(i) | Err(i) => i,
        };
        let line_start = match completed {
            0 => 0,
            n => self.newlines[n - 1] + 1,
        };
        (completed as u32 + 1, offset - line_start + 1)
    }

    /// Total number of lines, counting an unterminated final line.
    pub fn line_count(&self) -> usize {
        self.newlines.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILD_RULES: &str = "def compile src = job src\npublish tools = [gcc]\nsubscribe tools";

    #[test]
    fn join_covers_the_outer_extent() {
        let def_keyword = Span::new(0, 3);
        let parameter = Span::new(12, 15);
        assert_eq!(def_keyword.join(parameter), Span::new(0, 15));
        assert_eq!(parameter.join(def_keyword), Span::new(0, 15));
    }

    #[test]
    fn zero_span_has_no_extent() {
        assert!(Span::ZERO.is_empty());
        assert_eq!(Span::new(7, 9).len(), 2);
        assert!(!Span::new(7, 9).is_empty());
    }

    #[test]
    fn offsets_resolve_to_source_lines() {
        let index = LineIndex::new(BUILD_RULES);
        assert_eq!(index.line_count(), 3);
        // `def` opens the file, `job` sits mid-line.
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(18), (1, 19));
        // `publish` starts the second line, `subscribe` the third.
        assert_eq!(index.line_col(26), (2, 1));
        assert_eq!(index.line_col(48), (3, 1));
    }

    #[test]
    fn newline_bytes_belong_to_the_line_they_end() {
        let index = LineIndex::new("def x = 1\nx");
        assert_eq!(index.line_col(9), (1, 10));
        assert_eq!(index.line_col(10), (2, 1));
    }

    #[test]
    fn unterminated_final_lines_still_count() {
        assert_eq!(LineIndex::new("").line_count(), 1);
        assert_eq!(LineIndex::new("subscribe p").line_count(), 1);
        assert_eq!(LineIndex::new("subscribe p\n").line_count(), 2);
    }
}
