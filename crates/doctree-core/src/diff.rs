//! Line-oriented diffs between two versions of a section body.
//!
//! Built on an LCS diff at line granularity; no intra-line diffing. Lines
//! compare equal after trailing whitespace and line-terminator
//! normalization. Runs of blank lines on both sides of a change collapse
//! into a single `changed` record instead of N+M individual ones.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

/// Classification of one diff record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    /// Line present in both versions.
    Equal,
    /// Line only in the old version.
    Removed,
    /// Line only in the new version.
    Added,
    /// A blank-line run was replaced by another blank-line run.
    Changed,
}

/// One record of a line diff.
///
/// `equal`/`removed`/`added` records carry a single line in `text` with the
/// applicable line numbers; `changed` records carry whole runs in
/// `old_text`/`new_text`. Reconstruction consumes records in order: `equal`
/// and `removed` advance the old side, `equal` and `added` emit to the new
/// side, `changed` does both for its runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRecord {
    /// What happened to this line or run.
    pub tag: DiffTag,
    /// 0-based line number in the old text, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_line: Option<usize>,
    /// 0-based line number in the new text, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_line: Option<usize>,
    /// The line's text for `equal`/`removed`/`added` records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Old run for `changed` records, lines joined with `\n`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
    /// New run for `changed` records, lines joined with `\n`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_text: Option<String>,
}

impl DiffRecord {
    fn line(tag: DiffTag, old_line: Option<usize>, new_line: Option<usize>, text: &str) -> Self {
        Self {
            tag,
            old_line,
            new_line,
            text: Some(text.to_string()),
            old_text: None,
            new_text: None,
        }
    }

    fn is_blank(&self) -> bool {
        self.text.as_deref().is_some_and(|t| t.trim().is_empty())
    }
}

fn normalized_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim_end).collect()
}

/// Diff two texts line by line.
///
/// The inputs are compared after normalizing trailing whitespace and line
/// terminators; the records reproduce the normalized new text when applied
/// to the normalized old text.
#[must_use]
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffRecord> {
    let old_lines = normalized_lines(old);
    let new_lines = normalized_lines(new);
    let diff = TextDiff::from_slices(&old_lines, &new_lines);

    let mut records = Vec::new();
    for change in diff.iter_all_changes() {
        let record = match change.tag() {
            ChangeTag::Equal => DiffRecord::line(
                DiffTag::Equal,
                change.old_index(),
                change.new_index(),
                change.value(),
            ),
            ChangeTag::Delete => {
                DiffRecord::line(DiffTag::Removed, change.old_index(), None, change.value())
            },
            ChangeTag::Insert => {
                DiffRecord::line(DiffTag::Added, None, change.new_index(), change.value())
            },
        };
        records.push(record);
    }

    coalesce_blank_runs(records)
}

/// Collapse blank-line runs: a region of adjacent blank records where the
/// old and new sides disagree becomes a single `changed` record covering the
/// whole N-vs-M run. Regions where every record is `equal` stay as they are.
fn coalesce_blank_runs(records: Vec<DiffRecord>) -> Vec<DiffRecord> {
    let mut out = Vec::with_capacity(records.len());
    let mut i = 0;

    while i < records.len() {
        if !records[i].is_blank() {
            out.push(records[i].clone());
            i += 1;
            continue;
        }

        let end = records[i..].iter().take_while(|r| r.is_blank()).count() + i;
        let run = &records[i..end];
        if run.iter().all(|r| r.tag == DiffTag::Equal) {
            out.extend(run.iter().cloned());
        } else {
            let old_count = run
                .iter()
                .filter(|r| matches!(r.tag, DiffTag::Equal | DiffTag::Removed))
                .count();
            let new_count = run
                .iter()
                .filter(|r| matches!(r.tag, DiffTag::Equal | DiffTag::Added))
                .count();
            out.push(DiffRecord {
                tag: DiffTag::Changed,
                old_line: run.iter().find_map(|r| r.old_line),
                new_line: run.iter().find_map(|r| r.new_line),
                text: None,
                old_text: (old_count > 0).then(|| vec![""; old_count].join("\n")),
                new_text: (new_count > 0).then(|| vec![""; new_count].join("\n")),
            });
        }
        i = end;
    }

    out
}
