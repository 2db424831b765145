//! Interned source files and locations.
//!
//! The frontend consumes trees spanning many files, so every node carries a
//! [`Location`]: an interned [`FileId`] plus a byte [`Span`]. The
//! [`SourceMap`] owns file names and text; diagnostics resolve locations
//! through it when rendering.

use rustc_hash::FxHashMap;

use crate::span::{LineIndex, Span};

/// A unique identifier for a source file within one frontend invocation.
///
/// For top-level definition maps the id doubles as the file prefix used by
/// qualified-name resolution, so ids are assigned densely in the order
/// files are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// A position in the program: which file, and where in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: FileId,
    pub span: Span,
}

impl Location {
    pub fn new(file: FileId, span: Span) -> Self {
        Location { file, span }
    }

    /// A location for expressions synthesized by a lowering pass, attributed
    /// to the file of the construct that produced them.
    pub fn synthesized(file: FileId) -> Self {
        Location {
            file,
            span: Span::ZERO,
        }
    }
}

struct SourceFile {
    name: String,
    text: String,
    lines: LineIndex,
}

/// Registry of all source files visible to one frontend invocation.
///
/// Files are registered in the order the surrounding driver parsed them;
/// the resulting [`FileId`]s index both this map and the per-file
/// definition maps of the top-level expression.
#[derive(Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
    by_name: FxHashMap<String, FileId>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its id. Registering the same name twice
    /// returns the original id and leaves the first text in place.
    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) -> FileId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = FileId(self.files.len() as u32);
        let text = text.into();
        let lines = LineIndex::new(&text);
        self.by_name.insert(name.clone(), id);
        self.files.push(SourceFile { name, text, lines });
        id
    }

    /// The registered name of a file.
    pub fn name(&self, file: FileId) -> &str {
        &self.files[file.0 as usize].name
    }

    /// The full text of a file.
    pub fn text(&self, file: FileId) -> &str {
        &self.files[file.0 as usize].text
    }

    /// Number of registered files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Render a location as `name:line:col`, or `name:line:col-line:col`
    /// when the span covers more than one position.
    pub fn describe(&self, location: Location) -> String {
        let file = &self.files[location.file.0 as usize];
        let (sl, sc) = file.lines.line_col(location.span.start);
        if location.span.is_empty() {
            return format!("{}:{}:{}", file.name, sl, sc);
        }
        let (el, ec) = file.lines.line_col(location.span.end.saturating_sub(1));
        if (sl, sc) == (el, ec) {
            format!("{}:{}:{}", file.name, sl, sc)
        } else {
            format!("{}:{}:{}-{}:{}", file.name, sl, sc, el, ec)
        }
    }

    /// The source text a location covers, for quoting in diagnostics.
    pub fn snippet(&self, location: Location) -> &str {
        let file = &self.files[location.file.0 as usize];
        let start = location.span.start as usize;
        let end = (location.span.end as usize).min(file.text.len());
        file.text.get(start..end).unwrap_or("")
    }
}
