//! Heading and include-directive scanner for AsciiDoc and Markdown sources.
//!
//! The parser's sole job is sectioning: it turns one file's text, plus the
//! transitive closure of its `include::` directives, into a flat ordered
//! sequence of [`RawSection`] records. It assigns no identifiers and builds
//! no parent/child links — that is the id builder's job.
//!
//! ## Include expansion
//!
//! AsciiDoc `include::target[...]` lines are replaced inline by the target's
//! content, depth-first and left-to-right, with every expanded line carrying
//! a `(origin_file, line_in_origin)` annotation so that sections discovered
//! inside an includee report the includee — not the includer — as their
//! origin. A stack of open files guards against cycles and a maximum nesting
//! depth caps runaway chains; both conditions skip the directive and record a
//! [`ValidationWarning`] instead of failing the parse. Markdown has no
//! include mechanism; `include::` lines there are plain text.
//!
//! ## Fenced blocks
//!
//! Headings and directives inside fenced regions are literal text. Markdown
//! fences are backtick or tilde runs; AsciiDoc listing (`----`) and literal
//! (`....`) blocks use matched delimiter lines of equal length.
//!
//! The parser is reentrant and pure for a given filesystem snapshot: it reads
//! files and produces records, nothing else.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::{Dialect, RawSection, Result, ValidationWarning, WarningKind};

/// Maximum include nesting depth. The root file is depth 0; an include chain
/// of four files succeeds, a fifth is skipped with a warning.
pub const MAX_INCLUDE_DEPTH: usize = 4;

static MARKDOWN_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("hard-coded pattern"));

static ASCIIDOC_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(=+)\s+(.+?)\s*$").expect("hard-coded pattern"));

static INCLUDE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^include::(.+?)\[.*?\]\s*$").expect("hard-coded pattern"));

static MARKDOWN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(`{3,}|~{3,})").expect("hard-coded pattern"));

static ASCIIDOC_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-{4,}|\.{4,})\s*$").expect("hard-coded pattern"));

/// One line of the include-expanded document.
#[derive(Debug, Clone)]
struct SourceLine {
    /// Project-relative file this line came from.
    origin: String,
    /// 0-based line index within `origin`.
    line: usize,
    text: String,
    dialect: Option<Dialect>,
    /// Inside a fenced/listing block: headings and directives are literal.
    literal: bool,
}

/// Everything learned from parsing one root file with include expansion.
#[derive(Debug, Default)]
pub struct FileParse {
    /// Flat, ordered section records of the expanded document.
    pub sections: Vec<RawSection>,
    /// Non-fatal problems encountered during expansion.
    pub warnings: Vec<ValidationWarning>,
    /// Successful include edges: includer path to ordered includee paths.
    pub edges: BTreeMap<String, Vec<String>>,
    /// Every path that appeared as an include target, resolved
    /// project-relative, whether or not it could be read.
    pub include_targets: Vec<String>,
    /// Files contributing lines, root first, in expansion order.
    pub files: Vec<String>,
    /// Line counts per contributing file at parse time.
    pub line_counts: BTreeMap<String, usize>,
}

/// Sectioning parser for a project directory.
///
/// Holds nothing but the project root; every parse is independent and safe to
/// repeat.
pub struct MarkupParser<'a> {
    project_root: &'a Path,
}

impl<'a> MarkupParser<'a> {
    /// Create a parser rooted at the given project directory.
    #[must_use]
    pub const fn new(project_root: &'a Path) -> Self {
        Self { project_root }
    }

    /// Parse a file with include expansion enabled.
    ///
    /// # Errors
    ///
    /// Fails only when the file itself cannot be read; problems inside
    /// include targets are downgraded to warnings.
    pub fn parse(&self, rel_path: &str) -> Result<FileParse> {
        let mut parse = FileParse::default();
        let mut lines = Vec::new();
        let mut stack = vec![rel_path.to_string()];

        self.expand_into(rel_path, &mut stack, &mut lines, &mut parse)?;
        parse.sections = collect_sections(&lines);

        debug!(
            file = rel_path,
            sections = parse.sections.len(),
            warnings = parse.warnings.len(),
            "parsed"
        );
        Ok(parse)
    }

    /// Collect the resolved `include::` targets of a single file without
    /// expanding them. Used by discovery to classify roots.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read.
    pub fn include_targets(&self, rel_path: &str) -> Result<Vec<String>> {
        let path = Path::new(rel_path);
        if Dialect::from_path(path) != Some(Dialect::Asciidoc) {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(self.project_root.join(rel_path))?;
        let mut targets = Vec::new();
        let mut fence: Option<(char, usize)> = None;

        for line in content.lines() {
            if update_fence(Some(Dialect::Asciidoc), line, &mut fence) || fence.is_some() {
                continue;
            }
            if let Some(caps) = INCLUDE_DIRECTIVE.captures(line) {
                if let Some(resolved) = resolve_include_target(rel_path, &caps[1]) {
                    targets.push(resolved);
                }
            }
        }

        Ok(targets)
    }

    fn expand_into(
        &self,
        rel_path: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<SourceLine>,
        parse: &mut FileParse,
    ) -> Result<()> {
        let content = std::fs::read_to_string(self.project_root.join(rel_path))?;
        let dialect = Dialect::from_path(Path::new(rel_path));
        let file_lines: Vec<&str> = content.lines().collect();

        parse.files.push(rel_path.to_string());
        parse.line_counts.insert(rel_path.to_string(), file_lines.len());

        let mut fence: Option<(char, usize)> = None;
        for (line_no, raw) in file_lines.iter().enumerate() {
            let was_fenced = fence.is_some();
            let toggled = update_fence(dialect, raw, &mut fence);
            let literal = was_fenced || toggled || dialect.is_none();

            if !literal && dialect == Some(Dialect::Asciidoc) {
                if let Some(caps) = INCLUDE_DIRECTIVE.captures(raw) {
                    self.expand_include(rel_path, line_no, &caps[1], stack, out, parse);
                    continue;
                }
            }

            out.push(SourceLine {
                origin: rel_path.to_string(),
                line: line_no,
                text: (*raw).to_string(),
                dialect,
                literal,
            });
        }

        Ok(())
    }

    fn expand_include(
        &self,
        includer: &str,
        line_no: usize,
        target: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<SourceLine>,
        parse: &mut FileParse,
    ) {
        let warning = |kind, detail: String| ValidationWarning {
            kind,
            file: includer.to_string(),
            line: line_no,
            detail,
        };

        let Some(resolved) = resolve_include_target(includer, target) else {
            parse.warnings.push(warning(
                WarningKind::MissingInclude,
                format!("include target escapes the project root: {target}"),
            ));
            return;
        };
        parse.include_targets.push(resolved.clone());

        if stack.contains(&resolved) {
            parse.warnings.push(warning(
                WarningKind::Cycle,
                format!("include cycle: {resolved} is already being expanded"),
            ));
            return;
        }
        if stack.len() > MAX_INCLUDE_DEPTH {
            parse.warnings.push(warning(
                WarningKind::MaxDepthExceeded,
                format!("include nesting deeper than {MAX_INCLUDE_DEPTH}: {resolved}"),
            ));
            return;
        }
        if !self.project_root.join(&resolved).is_file() {
            parse.warnings.push(warning(
                WarningKind::MissingInclude,
                format!("include target not found: {resolved}"),
            ));
            return;
        }

        stack.push(resolved.clone());
        let expanded = self.expand_into(&resolved, stack, out, parse);
        stack.pop();

        match expanded {
            Ok(()) => {
                parse
                    .edges
                    .entry(includer.to_string())
                    .or_default()
                    .push(resolved);
            },
            Err(e) => {
                let detail = format!("failed to read {resolved}: {e}");
                parse
                    .warnings
                    .push(warning(WarningKind::IncludeReadError, detail));
            },
        }
    }
}

/// Track fence state for one line. Returns true when the line is itself a
/// fence delimiter (opening or closing).
pub(crate) fn update_fence(
    dialect: Option<Dialect>,
    line: &str,
    fence: &mut Option<(char, usize)>,
) -> bool {
    let run = match dialect {
        Some(Dialect::Markdown) => MARKDOWN_FENCE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
        Some(Dialect::Asciidoc) => ASCIIDOC_DELIMITER
            .captures(line)
            .map(|caps| caps[1].to_string()),
        None => None,
    };
    let delimiter = run.and_then(|run| run.chars().next().map(|ch| (ch, run.len())));

    match (*fence, delimiter) {
        (Some((open_char, open_len)), Some((ch, len))) if ch == open_char && len == open_len => {
            *fence = None;
            true
        },
        (Some(_), _) => false,
        (None, Some((ch, len))) => {
            *fence = Some((ch, len));
            true
        },
        (None, None) => false,
    }
}

/// Resolve an include target relative to the including file's directory,
/// normalized to a project-relative path. Returns `None` when the target
/// climbs out of the project root.
fn resolve_include_target(includer: &str, target: &str) -> Option<String> {
    let base = Path::new(includer).parent().unwrap_or_else(|| Path::new(""));
    let mut segments: Vec<String> = Vec::new();

    for component in base.components().chain(Path::new(target.trim()).components()) {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                segments.pop()?;
            },
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {},
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Recognize a heading line under the given dialect, yielding `(level, title)`.
pub(crate) fn parse_heading(dialect: Dialect, line: &str) -> Option<(usize, String)> {
    match dialect {
        Dialect::Markdown => MARKDOWN_HEADING
            .captures(line)
            .map(|caps| (caps[1].len(), caps[2].to_string())),
        Dialect::Asciidoc => ASCIIDOC_HEADING
            .captures(line)
            .map(|caps| (caps[1].len(), caps[2].to_string()))
            .filter(|(level, _)| *level <= 6),
    }
}

fn heading_of(line: &SourceLine) -> Option<(usize, String)> {
    if line.literal {
        return None;
    }
    parse_heading(line.dialect?, &line.text)
}

/// Fold the expanded line stream into flat section records.
///
/// A section's extent runs from the line after its heading up to the next
/// heading of equal or shallower level; deeper headings stay inside the
/// enclosing extent. At most one leading and one trailing blank line are
/// trimmed from the body.
fn collect_sections(lines: &[SourceLine]) -> Vec<RawSection> {
    struct Found {
        idx: usize,
        level: usize,
        title: String,
    }

    let headings: Vec<Found> = lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            heading_of(line).map(|(level, title)| Found { idx, level, title })
        })
        .collect();

    let mut sections = Vec::with_capacity(headings.len());
    for (pos, heading) in headings.iter().enumerate() {
        let end = headings[pos + 1..]
            .iter()
            .find(|other| other.level <= heading.level)
            .map_or(lines.len(), |other| other.idx);

        let mut start = heading.idx + 1;
        let mut stop = end;
        if start < stop && lines[start].text.trim().is_empty() {
            start += 1;
        }
        if stop > start && lines[stop - 1].text.trim().is_empty() {
            stop -= 1;
        }

        let origin = &lines[heading.idx].origin;
        let content = lines[start..stop]
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let body_end = lines[start..stop]
            .iter()
            .rev()
            .find(|line| &line.origin == origin)
            .map_or(lines[heading.idx].line, |line| line.line);

        sections.push(RawSection {
            level: heading.level,
            title: heading.title.clone(),
            origin_file: origin.clone(),
            heading_line: lines[heading.idx].line,
            content,
            body_end,
        });
    }

    sections
}
