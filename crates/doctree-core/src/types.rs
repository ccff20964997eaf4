//! Core data structures for the doctree index.
//!
//! The central entity is [`Section`]: one heading plus its body, addressed by
//! a dotted slug identifier. Sections never hold direct references to each
//! other — navigation goes through the index's id map via `parent_id` and the
//! ordered `children` list, which keeps the representation acyclic across
//! include boundaries.
//!
//! All wire-visible types serialize with their field names as-is; the JSON
//! produced here is the payload clients see.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Markup dialect of a source file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// AsciiDoc-family files: `.adoc`, `.ad`, `.asciidoc`.
    Asciidoc,
    /// Markdown files: `.md`, `.markdown`.
    Markdown,
}

impl Dialect {
    /// Detect the dialect from a file path, by extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "adoc" | "ad" | "asciidoc" => Some(Self::Asciidoc),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// The heading marker character for this dialect (`=` or `#`).
    #[must_use]
    pub const fn heading_marker(self) -> char {
        match self {
            Self::Asciidoc => '=',
            Self::Markdown => '#',
        }
    }
}

/// A section of a document: one heading and the body beneath it.
///
/// The body extends to the next heading of equal or shallower level in the
/// fully include-expanded document, so a parent's extent encloses its
/// children. `line_start`/`line_end` are 0-based indices within
/// `source_file` — the file the heading physically lives in after include
/// resolution, which may differ from the root file that pulled it in.
///
/// Identifiers are not stable under heading renames: re-resolve ids after any
/// edit that changes a heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Dotted path of lowercase slug segments, unique within the project.
    pub id: String,

    /// Exact text of the heading line, markers stripped.
    pub title: String,

    /// Heading depth, 1..=6.
    pub level: usize,

    /// Body text, with at most one leading and one trailing blank line
    /// trimmed. Inner blank lines and fenced blocks are preserved verbatim.
    pub content: String,

    /// Project-relative path of the file this section physically resides in.
    pub source_file: String,

    /// 0-based line index of the heading line within `source_file`.
    pub line_start: usize,

    /// 0-based line index of the last body line within `source_file`
    /// (inclusive). Equals `line_start` for an empty body.
    pub line_end: usize,

    /// Identifier of the nearest ancestor section, absent for top-level
    /// sections of a root file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Child section identifiers in source order.
    pub children: Vec<String>,
}

impl Section {
    /// Whether the body contains any non-whitespace text.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Whitespace-separated word count of the body.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// A raw, identifier-free section record as produced by the parser.
///
/// The parser yields these in document order; the id builder turns them into
/// [`Section`]s with dotted identifiers and parent/child links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    /// Heading depth, 1..=6.
    pub level: usize,
    /// Heading text with markers stripped.
    pub title: String,
    /// Project-relative origin file of the heading line.
    pub origin_file: String,
    /// 0-based heading line index within `origin_file`.
    pub heading_line: usize,
    /// Trimmed body text (see [`Section::content`]).
    pub content: String,
    /// 0-based index of the last body line within `origin_file`; equals
    /// `heading_line` when the body is empty.
    pub body_end: usize,
}

/// Category of a non-fatal problem found while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// An `include::` target does not exist.
    MissingInclude,
    /// An `include::` target exists but could not be read.
    IncludeReadError,
    /// An `include::` target is already on the open-file stack.
    Cycle,
    /// Include nesting exceeded the maximum depth.
    MaxDepthExceeded,
}

/// A non-fatal problem recorded during parsing.
///
/// Warnings accumulate on the index and are surfaced by
/// `validate_structure`; they never abort an index build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// What went wrong.
    pub kind: WarningKind,
    /// Project-relative path of the file containing the offending directive.
    pub file: String,
    /// 0-based line index of the directive within `file`.
    pub line: usize,
    /// Human-readable detail, including the include target where relevant.
    pub detail: String,
}

/// Summary information about a root file, used in structure payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Project-relative path.
    pub path: String,
    /// Number of sections physically residing in this file.
    pub section_count: usize,
    /// Total line count of the file at last parse.
    pub total_lines: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_detection_is_case_insensitive() {
        assert_eq!(
            Dialect::from_path(Path::new("doc/arch.ADOC")),
            Some(Dialect::Asciidoc)
        );
        assert_eq!(
            Dialect::from_path(Path::new("README.md")),
            Some(Dialect::Markdown)
        );
        assert_eq!(
            Dialect::from_path(Path::new("notes.Markdown")),
            Some(Dialect::Markdown)
        );
        assert_eq!(Dialect::from_path(Path::new("chapter.ad")), Some(Dialect::Asciidoc));
        assert_eq!(Dialect::from_path(Path::new("image.png")), None);
        assert_eq!(Dialect::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn section_word_count_splits_on_whitespace() {
        let section = Section {
            id: "intro".into(),
            title: "Intro".into(),
            level: 1,
            content: "Hello brave\n\nnew  world".into(),
            source_file: "main.adoc".into(),
            line_start: 0,
            line_end: 4,
            parent_id: None,
            children: vec![],
        };

        assert_eq!(section.word_count(), 4);
        assert!(section.has_content());
    }

    #[test]
    fn warning_kind_serializes_snake_case() {
        let warning = ValidationWarning {
            kind: WarningKind::MissingInclude,
            file: "main.adoc".into(),
            line: 3,
            detail: "target _chap.adoc".into(),
        };

        let json = serde_json::to_value(&warning).expect("warning serializes");
        assert_eq!(json["kind"], "missing_include");
        assert_eq!(json["line"], 3);
    }
}
