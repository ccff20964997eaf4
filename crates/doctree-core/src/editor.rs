//! Section-scoped rewrites of source files with atomic durability.
//!
//! Two operations: replacing a section's body and inserting a new child
//! section. Both splice lines of the section's `source_file`, write the new
//! bytes to a sibling temp file, and atomically rename it over the original,
//! so a concurrent reader sees either the old or the new file, never a torn
//! write. On success the editor refreshes the touched file synchronously
//! before returning, so a follow-up query reflects the edit.
//!
//! Before writing, the editor re-reads the file and verifies that the
//! heading line it is about to edit still parses to the indexed level and
//! title; a mismatch means the file changed under us and fails with `stale`.
//! Clients recover by refreshing the index and retrying.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::diff::{diff_lines, DiffRecord};
use crate::index::{Indexer, ProjectIndex};
use crate::watcher::EditSuppressor;
use crate::{parser, Dialect, Error, Result, Section};

/// Where to place a newly inserted section among the parent's children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    /// Before the first existing child.
    Before,
    /// After the last existing child.
    After,
    /// Alias of `after`.
    #[default]
    Append,
}

/// Successful edit payload: the change report for the touched section.
#[derive(Debug, Serialize)]
pub struct EditOutcome {
    /// Always `true`; failures surface as structured errors instead.
    pub success: bool,
    /// Line-diff of the affected body text.
    pub diff: Vec<DiffRecord>,
}

/// Performs section-scoped file mutations and keeps the index in step.
pub struct SectionEditor<'a> {
    indexer: &'a Indexer,
    suppressor: Option<&'a EditSuppressor>,
}

impl<'a> SectionEditor<'a> {
    /// Editor without watcher suppression (tests, one-shot tools).
    #[must_use]
    pub const fn new(indexer: &'a Indexer) -> Self {
        Self {
            indexer,
            suppressor: None,
        }
    }

    /// Editor that records its writes so the watcher can discard the echo.
    #[must_use]
    pub const fn with_suppressor(indexer: &'a Indexer, suppressor: &'a EditSuppressor) -> Self {
        Self {
            indexer,
            suppressor: Some(suppressor),
        }
    }

    /// Replace the body of the section identified by `id` with `content`.
    ///
    /// # Errors
    ///
    /// `not_found` for an unknown id, `stale` when the file on disk no
    /// longer matches the indexed section, `io_error` on read/write failure.
    /// A failed write leaves the original file untouched.
    #[instrument(skip(self, index, content))]
    pub fn update_section(
        &self,
        index: &mut ProjectIndex,
        id: &str,
        content: &str,
    ) -> Result<EditOutcome> {
        let section = index.section_required(id)?.clone();
        let abs = index.project_root().join(&section.source_file);
        let text = std::fs::read_to_string(&abs)?;
        let mut lines: Vec<String> = text.lines().map(String::from).collect();

        verify_heading(&lines, &section)?;
        let splice_start = section.line_start + 1;
        let splice_end = if section.line_end > section.line_start {
            section.line_end + 1
        } else {
            splice_start
        };
        if splice_end > lines.len() {
            return Err(Error::Stale(format!(
                "section '{id}' extends past the end of {}",
                section.source_file
            )));
        }

        let body = content.trim_end_matches('\n');
        let diff = diff_lines(&section.content, body);

        let mut block = vec![String::new()];
        block.extend(body.lines().map(String::from));
        let after = splice_start + block.len();
        lines.splice(splice_start..splice_end, block);
        if after < lines.len() && !lines[after].trim().is_empty() {
            lines.insert(after, String::new());
        }

        self.persist(&section.source_file, &abs, &lines)?;
        self.indexer
            .refresh(index, &[section.source_file.clone()])?;

        debug!(id, "section updated");
        Ok(EditOutcome {
            success: true,
            diff,
        })
    }

    /// Insert a new section as a child of `parent_id`.
    ///
    /// The heading is emitted at `parent.level + 1` in the dialect of the
    /// parent's source file, separated from surrounding content by single
    /// blank lines.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`SectionEditor::update_section`], plus
    /// `invalid_argument` when the parent already sits at the deepest
    /// heading level.
    #[instrument(skip(self, index, content, position))]
    pub fn insert_section(
        &self,
        index: &mut ProjectIndex,
        parent_id: &str,
        title: &str,
        content: &str,
        position: InsertPosition,
    ) -> Result<EditOutcome> {
        let parent = index.section_required(parent_id)?.clone();
        if parent.level >= 6 {
            return Err(Error::InvalidArgument(format!(
                "cannot insert below '{parent_id}': heading levels stop at 6"
            )));
        }
        let dialect = Dialect::from_path(Path::new(&parent.source_file)).ok_or_else(|| {
            Error::Parse(format!("unknown markup dialect: {}", parent.source_file))
        })?;

        let abs = index.project_root().join(&parent.source_file);
        let text = std::fs::read_to_string(&abs)?;
        let mut lines: Vec<String> = text.lines().map(String::from).collect();
        verify_heading(&lines, &parent)?;

        let insert_at = match position {
            InsertPosition::Before => parent
                .children
                .iter()
                .filter_map(|child| index.section(child))
                .find(|child| child.source_file == parent.source_file)
                .map(|child| child.line_start),
            InsertPosition::After | InsertPosition::Append => None,
        }
        .unwrap_or(parent.line_end + 1);
        if insert_at > lines.len() {
            return Err(Error::Stale(format!(
                "section '{parent_id}' extends past the end of {}",
                parent.source_file
            )));
        }

        let marker = dialect.heading_marker().to_string();
        let heading = format!("{} {}", marker.repeat(parent.level + 1), title);
        let body = content.trim_end_matches('\n');

        let mut block = Vec::new();
        if insert_at > 0 && !lines[insert_at - 1].trim().is_empty() {
            block.push(String::new());
        }
        block.push(heading.clone());
        if !body.is_empty() {
            block.push(String::new());
            block.extend(body.lines().map(String::from));
        }
        if insert_at < lines.len() && !lines[insert_at].trim().is_empty() {
            block.push(String::new());
        }
        lines.splice(insert_at..insert_at, block);

        self.persist(&parent.source_file, &abs, &lines)?;
        self.indexer
            .refresh(index, &[parent.source_file.clone()])?;

        let inserted = if body.is_empty() {
            heading
        } else {
            format!("{heading}\n\n{body}")
        };
        debug!(parent_id, title, "section inserted");
        Ok(EditOutcome {
            success: true,
            diff: diff_lines("", &inserted),
        })
    }

    fn persist(&self, rel: &str, abs: &Path, lines: &[String]) -> Result<()> {
        let dir = abs
            .parent()
            .ok_or_else(|| Error::InvalidArgument(format!("no parent directory for {rel}")))?;

        let mut bytes = lines.join("\n");
        bytes.push('\n');

        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.as_file().write_all(bytes.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(abs).map_err(|e| Error::Io(e.error))?;

        if let Some(suppressor) = self.suppressor {
            let mtime = std::fs::metadata(abs).and_then(|meta| meta.modified()).ok();
            suppressor.record(rel, mtime);
        }
        Ok(())
    }
}

fn verify_heading(lines: &[String], section: &Section) -> Result<()> {
    let dialect = Dialect::from_path(Path::new(&section.source_file))
        .ok_or_else(|| Error::Parse(format!("unknown markup dialect: {}", section.source_file)))?;

    let matches = lines.get(section.line_start).is_some_and(|line| {
        parser::parse_heading(dialect, line)
            .is_some_and(|(level, title)| level == section.level && title == section.title)
    });
    if matches {
        Ok(())
    } else {
        Err(Error::Stale(format!(
            "heading '{}' is no longer at line {} of {}",
            section.title, section.line_start, section.source_file
        )))
    }
}
