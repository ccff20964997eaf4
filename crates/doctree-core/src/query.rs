//! Read-only operations over the project index.
//!
//! Every function here takes `&ProjectIndex` and leaves it untouched; the
//! caller is expected to hold the shared side of the index lock for the span
//! of the call. The payload structs are the wire shapes returned to clients.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::index::ProjectIndex;
use crate::parser::update_fence;
use crate::{Dialect, Error, FileInfo, Result, Section, ValidationWarning};

/// Characters of context on each side of a search match.
const SNIPPET_RADIUS: usize = 40;

static NUMERIC_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)]?\s").expect("hard-coded pattern"));

static ADOC_XREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"xref:([^\[\s]+)\[").expect("hard-coded pattern"));

static ADOC_ANCHOR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<([^>,]+?)(?:,[^>]*)?>>").expect("hard-coded pattern"));

static MD_LOCAL_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\]\(([^)\s#]+\.(?:md|markdown|adoc|ad|asciidoc))(?:#[^)\s]*)?\)")
        .expect("hard-coded pattern")
});

/// One row of the flattened structure listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureEntry {
    /// Section identifier.
    pub id: String,
    /// Heading text.
    pub title: String,
    /// Heading depth.
    pub level: usize,
    /// Number of direct children.
    pub children_count: usize,
}

impl StructureEntry {
    fn of(section: &Section) -> Self {
        Self {
            id: section.id.clone(),
            title: section.title.clone(),
            level: section.level,
            children_count: section.children.len(),
        }
    }
}

/// Full section payload returned by `get_section`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionView {
    /// Section identifier.
    pub id: String,
    /// Heading text.
    pub title: String,
    /// Heading depth.
    pub level: usize,
    /// Body text.
    pub content: String,
    /// Project-relative origin file.
    pub source_file: String,
    /// 0-based heading line in `source_file`.
    pub line_start: usize,
    /// 0-based last body line in `source_file`.
    pub line_end: usize,
    /// Direct child identifiers in source order.
    pub children: Vec<String>,
}

impl SectionView {
    fn of(section: &Section) -> Self {
        Self {
            id: section.id.clone(),
            title: section.title.clone(),
            level: section.level,
            content: section.content.clone(),
            source_file: section.source_file.clone(),
            line_start: section.line_start,
            line_end: section.line_end,
            children: section.children.clone(),
        }
    }
}

/// Recursive section subtree used by `get_root_files_structure`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionNode {
    /// Section identifier.
    pub id: String,
    /// Heading text.
    pub title: String,
    /// Heading depth.
    pub level: usize,
    /// Child subtrees in source order.
    pub children: Vec<SectionNode>,
}

/// One root file with its top-level section subtrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootFileStructure {
    /// Project-relative root file path.
    pub path: String,
    /// Summary info for the file.
    pub file_info: FileInfo,
    /// Top-level sections of this root, each with its full subtree.
    pub sections: Vec<SectionNode>,
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Section identifier.
    pub id: String,
    /// Heading text.
    pub title: String,
    /// Relevance score; higher is better.
    pub score: f64,
    /// Content window around the first match.
    pub snippet: String,
}

/// Per-section metadata payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMetadata {
    /// Section identifier.
    pub id: String,
    /// Heading text.
    pub title: String,
    /// Heading depth.
    pub level: usize,
    /// Whitespace-separated word count of the body.
    pub word_count: usize,
    /// Number of direct children.
    pub children_count: usize,
    /// Whether the body has any non-whitespace text.
    pub has_content: bool,
}

/// Project-wide metadata payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Absolute path of the indexed project directory.
    pub project_root: String,
    /// Total number of sections in the index.
    pub total_sections: usize,
    /// Total word count across all section bodies.
    pub total_words: usize,
    /// Ordered root file paths.
    pub root_files: Vec<String>,
}

/// A link from one section to another document or anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    /// Identifier of the referencing section.
    pub from: String,
    /// Referenced target as written in the source.
    pub target: String,
}

/// Dependency report: include graph plus content-level references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependencies {
    /// Include edges: includer path to ordered includee paths.
    pub includes: BTreeMap<String, Vec<String>>,
    /// Cross-references found in section bodies, in source order.
    pub cross_references: Vec<CrossReference>,
    /// Parentless sections that are not the top level of any root. Always
    /// empty under the index invariants; emitted for verification.
    pub orphaned_sections: Vec<String>,
}

/// Result of `validate_structure`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the index satisfies every structural invariant.
    pub valid: bool,
    /// Invariant violations found by the self-check.
    pub issues: Vec<String>,
    /// Parser warnings accumulated during the last build.
    pub warnings: Vec<ValidationWarning>,
}

/// Flattened structure listing in depth-first source order, pruned to
/// headings at or above `max_depth`.
#[must_use]
pub fn get_structure(index: &ProjectIndex, max_depth: Option<usize>) -> Vec<StructureEntry> {
    index
        .dfs_sections()
        .into_iter()
        .filter(|section| max_depth.is_none_or(|depth| section.level <= depth))
        .map(StructureEntry::of)
        .collect()
}

/// Full payload for one section.
///
/// # Errors
///
/// `not_found` when the identifier is not in the index.
pub fn get_section(index: &ProjectIndex, id: &str) -> Result<SectionView> {
    index.section_required(id).map(SectionView::of)
}

/// All sections at exactly the given heading level, in source order.
///
/// # Errors
///
/// `invalid_argument` when `level` is outside 1..=6.
pub fn sections_at_level(index: &ProjectIndex, level: usize) -> Result<Vec<SectionView>> {
    if !(1..=6).contains(&level) {
        return Err(Error::InvalidArgument(format!(
            "level must be between 1 and 6, got {level}"
        )));
    }
    Ok(index
        .dfs_sections()
        .into_iter()
        .filter(|section| section.level == level)
        .map(SectionView::of)
        .collect())
}

/// Per-root structure with recursive subtrees. Included files are excluded.
#[must_use]
pub fn get_root_files_structure(index: &ProjectIndex) -> Vec<RootFileStructure> {
    index
        .root_files()
        .iter()
        .map(|root| RootFileStructure {
            path: root.clone(),
            file_info: index.file_info(root),
            sections: index
                .top_level(root)
                .iter()
                .filter_map(|id| subtree(index, id))
                .collect(),
        })
        .collect()
}

fn subtree(index: &ProjectIndex, id: &str) -> Option<SectionNode> {
    let section = index.section(id)?;
    Some(SectionNode {
        id: section.id.clone(),
        title: section.title.clone(),
        level: section.level,
        children: section
            .children
            .iter()
            .filter_map(|child| subtree(index, child))
            .collect(),
    })
}

/// Chapter listing for arc42-style documents: level-2 sections whose title
/// carries a numeric prefix (`1. `, `01 `, `2) `), plus level-1 sections
/// without one.
#[must_use]
pub fn get_main_chapters(index: &ProjectIndex) -> Vec<StructureEntry> {
    index
        .dfs_sections()
        .into_iter()
        .filter(|section| {
            let numbered = NUMERIC_PREFIX.is_match(&section.title);
            (section.level == 2 && numbered) || (section.level == 1 && !numbered)
        })
        .map(StructureEntry::of)
        .collect()
}

/// Case-insensitive substring search over titles and bodies.
///
/// Title matches rank before content matches, earlier matches before later
/// ones, shallower sections before deeper ones.
///
/// # Errors
///
/// `invalid_argument` for an empty or whitespace-only query.
pub fn search_content(index: &ProjectIndex, query: &str) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Err(Error::InvalidArgument("query cannot be empty".into()));
    }
    let needle = query.to_lowercase();

    let mut ranked: Vec<(bool, usize, usize, SearchHit)> = Vec::new();
    for section in index.dfs_sections() {
        let title_pos = section.title.to_lowercase().find(&needle);
        let content_pos = section.content.to_lowercase().find(&needle);
        let (in_title, pos) = match (title_pos, content_pos) {
            (Some(pos), _) => (true, pos),
            (None, Some(pos)) => (false, pos),
            (None, None) => continue,
        };

        let base: f64 = if in_title { 100.0 } else { 50.0 };
        #[allow(clippy::cast_precision_loss)]
        let score = base - (pos as f64).min(40.0) * 0.5 - section.level as f64;
        let snippet = snippet_window(&section.content, content_pos, needle.chars().count());

        ranked.push((
            in_title,
            pos,
            section.level,
            SearchHit {
                id: section.id.clone(),
                title: section.title.clone(),
                score,
                snippet,
            },
        ));
    }

    ranked.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    Ok(ranked.into_iter().map(|(_, _, _, hit)| hit).collect())
}

/// Window of content around the first match, [`SNIPPET_RADIUS`] characters
/// on each side. Falls back to the start of the content when the match was
/// in the title only.
fn snippet_window(content: &str, match_pos: Option<usize>, needle_chars: usize) -> String {
    let char_offset = match_pos.map_or(0, |byte_pos| {
        let lowered = content.to_lowercase();
        lowered
            .get(..byte_pos)
            .map_or(0, |prefix| prefix.chars().count())
    });
    let start = char_offset.saturating_sub(SNIPPET_RADIUS);
    let len = SNIPPET_RADIUS + needle_chars + SNIPPET_RADIUS;

    content.chars().skip(start).take(len).collect()
}

/// Metadata for one section.
///
/// # Errors
///
/// `not_found` when the identifier is not in the index.
pub fn section_metadata(index: &ProjectIndex, id: &str) -> Result<SectionMetadata> {
    let section = index.section_required(id)?;
    Ok(SectionMetadata {
        id: section.id.clone(),
        title: section.title.clone(),
        level: section.level,
        word_count: section.word_count(),
        children_count: section.children.len(),
        has_content: section.has_content(),
    })
}

/// Project-wide metadata.
#[must_use]
pub fn project_metadata(index: &ProjectIndex) -> ProjectMetadata {
    let sections = index.dfs_sections();
    ProjectMetadata {
        project_root: index.project_root().display().to_string(),
        total_sections: sections.len(),
        total_words: sections.iter().map(|s| s.word_count()).sum(),
        root_files: index.root_files().to_vec(),
    }
}

/// Include graph, cross-references, and the orphan check.
#[must_use]
pub fn get_dependencies(index: &ProjectIndex) -> Dependencies {
    let mut cross_references = Vec::new();
    for section in index.dfs_sections() {
        collect_references(section, &mut cross_references);
    }

    let top_level: BTreeSet<&String> = index
        .root_files()
        .iter()
        .flat_map(|root| index.top_level(root).iter())
        .collect();
    let mut orphaned_sections: Vec<String> = index
        .dfs_sections()
        .into_iter()
        .filter(|section| section.parent_id.is_none() && !top_level.contains(&section.id))
        .map(|section| section.id.clone())
        .collect();
    orphaned_sections.sort();

    Dependencies {
        includes: index.include_edges(),
        cross_references,
        orphaned_sections,
    }
}

/// Scan a section's direct text (its body up to the first child heading) for
/// outgoing references.
fn collect_references(section: &Section, out: &mut Vec<CrossReference>) {
    let Some(dialect) = Dialect::from_path(Path::new(&section.source_file)) else {
        return;
    };
    let text = direct_text(section, dialect);

    match dialect {
        Dialect::Asciidoc => {
            for caps in ADOC_XREF.captures_iter(&text) {
                out.push(CrossReference {
                    from: section.id.clone(),
                    target: caps[1].to_string(),
                });
            }
            for caps in ADOC_ANCHOR_REF.captures_iter(&text) {
                out.push(CrossReference {
                    from: section.id.clone(),
                    target: caps[1].trim().to_string(),
                });
            }
        },
        Dialect::Markdown => {
            for caps in MD_LOCAL_LINK.captures_iter(&text) {
                out.push(CrossReference {
                    from: section.id.clone(),
                    target: caps[1].to_string(),
                });
            }
        },
    }
}

/// The body lines preceding the first descendant heading, with fenced
/// regions kept but never treated as headings.
fn direct_text(section: &Section, dialect: Dialect) -> String {
    let mut fence: Option<(char, usize)> = None;
    let mut out = Vec::new();

    for line in section.content.lines() {
        let toggled = update_fence(Some(dialect), line, &mut fence);
        let literal = toggled || fence.is_some();
        if !literal && crate::parser::parse_heading(dialect, line).is_some() {
            break;
        }
        out.push(line);
    }

    out.join("\n")
}

/// Invariant self-check plus accumulated parser warnings.
#[must_use]
pub fn validate_structure(index: &ProjectIndex) -> ValidationReport {
    let issues = index.integrity_issues();
    ValidationReport {
        valid: issues.is_empty(),
        issues,
        warnings: index.warnings(),
    }
}
