//! The in-memory project index and the indexer that maintains it.
//!
//! [`ProjectIndex`] owns every [`Section`] exclusively; other components hold
//! sections only for the span of a single operation and must not cache them
//! across a refresh boundary. [`Indexer`] performs full builds and targeted
//! refreshes; callers serialize mutation through one exclusive lock so that
//! readers observe either the pre- or post-refresh state, never a partial
//! one.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::ids::IdBuilder;
use crate::parser::{FileParse, MarkupParser};
use crate::{discovery, Error, FileInfo, Result, Section, ValidationWarning};

/// Per-root bookkeeping retained from the last parse of that root.
#[derive(Debug, Clone, Default)]
struct RootParse {
    /// Files contributing lines: the root first, then transitive includes in
    /// expansion order.
    files: Vec<String>,
    /// Successful include edges discovered during this parse.
    edges: BTreeMap<String, Vec<String>>,
    /// Every include target seen, resolved project-relative, existing or not.
    targets: Vec<String>,
    warnings: Vec<ValidationWarning>,
    line_counts: BTreeMap<String, usize>,
}

/// The single shared mutable structure of the system.
///
/// Maps section identifiers to sections and tracks the file-level shape of
/// the project: which files are roots, which are include targets, and which
/// sections live in which file.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    project_root: PathBuf,
    sections: HashMap<String, Section>,
    root_files: Vec<String>,
    /// Top-level section ids per root file, in source order.
    top_level: BTreeMap<String, Vec<String>>,
    root_meta: BTreeMap<String, RootParse>,
    included_files: BTreeSet<String>,
    sections_by_file: HashMap<String, Vec<String>>,
    file_lines: BTreeMap<String, usize>,
}

impl ProjectIndex {
    fn empty(project_root: PathBuf, root_files: Vec<String>) -> Self {
        Self {
            project_root,
            root_files,
            ..Self::default()
        }
    }

    /// Absolute path of the project directory this index describes.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Look up a section by identifier.
    #[must_use]
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.get(id)
    }

    /// Look up a section by identifier, failing with `not_found`.
    pub fn section_required(&self, id: &str) -> Result<&Section> {
        self.section(id)
            .ok_or_else(|| Error::NotFound(format!("no section with id '{id}'")))
    }

    /// Number of sections in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the index holds no sections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Ordered project-relative root file paths.
    #[must_use]
    pub fn root_files(&self) -> &[String] {
        &self.root_files
    }

    /// Paths that appeared as the target of at least one include directive.
    #[must_use]
    pub fn included_files(&self) -> &BTreeSet<String> {
        &self.included_files
    }

    /// Top-level section ids of one root file, in source order.
    #[must_use]
    pub fn top_level(&self, root: &str) -> &[String] {
        self.top_level.get(root).map_or(&[], Vec::as_slice)
    }

    /// Merged include edges: includer path to ordered includee paths.
    #[must_use]
    pub fn include_edges(&self) -> BTreeMap<String, Vec<String>> {
        let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for meta in self.root_meta.values() {
            for (includer, includees) in &meta.edges {
                let entry = merged.entry(includer.clone()).or_default();
                for includee in includees {
                    if !entry.contains(includee) {
                        entry.push(includee.clone());
                    }
                }
            }
        }
        merged
    }

    /// All parse warnings of the last build, in root order.
    #[must_use]
    pub fn warnings(&self) -> Vec<ValidationWarning> {
        self.root_files
            .iter()
            .filter_map(|root| self.root_meta.get(root))
            .flat_map(|meta| meta.warnings.iter().cloned())
            .collect()
    }

    /// Section ids physically residing in the given file, in source order.
    #[must_use]
    pub fn sections_in_file(&self, path: &str) -> Option<&Vec<String>> {
        self.sections_by_file.get(path)
    }

    /// Whether a path is known to the index as a root, a contributing file,
    /// or an include target.
    #[must_use]
    pub fn is_known_file(&self, path: &str) -> bool {
        self.root_files.iter().any(|r| r == path)
            || self.included_files.contains(path)
            || self.sections_by_file.contains_key(path)
    }

    /// Summary info for a file, from the last parse that touched it.
    #[must_use]
    pub fn file_info(&self, path: &str) -> FileInfo {
        FileInfo {
            path: path.to_string(),
            section_count: self
                .sections_by_file
                .get(path)
                .map_or(0, Vec::len),
            total_lines: self.file_lines.get(path).copied().unwrap_or(0),
        }
    }

    /// All sections in depth-first source order: roots in order, each root's
    /// top-level sections, each followed by its subtree.
    #[must_use]
    pub fn dfs_sections(&self) -> Vec<&Section> {
        let mut out = Vec::with_capacity(self.sections.len());
        for root in &self.root_files {
            for id in self.top_level(root) {
                self.push_subtree(id, &mut out);
            }
        }
        out
    }

    fn push_subtree<'s>(&'s self, id: &str, out: &mut Vec<&'s Section>) {
        if let Some(section) = self.sections.get(id) {
            out.push(section);
            for child in &section.children {
                self.push_subtree(child, out);
            }
        }
    }

    /// Check every index invariant and return a description of each
    /// violation. An empty result means the index is structurally sound.
    #[must_use]
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (id, section) in &self.sections {
            if let Some(parent_id) = &section.parent_id {
                match self.sections.get(parent_id) {
                    None => issues.push(format!("section '{id}' has dangling parent '{parent_id}'")),
                    Some(parent) => {
                        let occurrences =
                            parent.children.iter().filter(|c| *c == id).count();
                        if occurrences != 1 {
                            issues.push(format!(
                                "section '{id}' appears {occurrences} times in children of '{parent_id}'"
                            ));
                        }
                        if section.level <= parent.level {
                            issues.push(format!(
                                "section '{id}' (level {}) is not deeper than parent '{parent_id}' (level {})",
                                section.level, parent.level
                            ));
                        }
                    },
                }
            }

            for child in &section.children {
                if !self.sections.contains_key(child) {
                    issues.push(format!("section '{id}' lists unknown child '{child}'"));
                }
            }

            if section.line_start > section.line_end {
                issues.push(format!(
                    "section '{id}' has line_start {} after line_end {}",
                    section.line_start, section.line_end
                ));
            }
            if let Some(total) = self.file_lines.get(&section.source_file) {
                if section.line_end >= *total && *total > 0 {
                    issues.push(format!(
                        "section '{id}' ends at line {} beyond {} ({} lines)",
                        section.line_end, section.source_file, total
                    ));
                }
            }
        }

        // Children of the same parent within one file must appear in source order.
        for section in self.sections.values() {
            let mut last: Option<(&str, usize)> = None;
            for child_id in &section.children {
                if let Some(child) = self.sections.get(child_id) {
                    if let Some((file, line)) = last {
                        if child.source_file == file && child.line_start < line {
                            issues.push(format!(
                                "children of '{}' out of source order at '{child_id}'",
                                section.id
                            ));
                        }
                    }
                    last = Some((&child.source_file, child.line_start));
                }
            }
        }

        for root in &self.root_files {
            if self.included_files.contains(root) {
                issues.push(format!("'{root}' is both a root file and an included file"));
            }
        }

        issues
    }

    fn drop_root_sections(&mut self, root: &str) {
        let mut doomed = Vec::new();
        for id in self.top_level(root) {
            Self::collect_subtree(&self.sections, id, &mut doomed);
        }
        for id in doomed {
            self.sections.remove(&id);
        }
        self.top_level.remove(root);
        self.root_meta.remove(root);
    }

    fn collect_subtree(sections: &HashMap<String, Section>, id: &str, out: &mut Vec<String>) {
        if let Some(section) = sections.get(id) {
            out.push(id.to_string());
            for child in &section.children {
                Self::collect_subtree(sections, child, out);
            }
        }
    }

    fn install_root(&mut self, root: &str, parse: FileParse, ids: &mut IdBuilder) {
        let FileParse {
            sections: records,
            warnings,
            edges,
            include_targets,
            files,
            line_counts,
        } = parse;

        let sections = ids.build(records);
        self.top_level.insert(
            root.to_string(),
            sections
                .iter()
                .filter(|s| s.parent_id.is_none())
                .map(|s| s.id.clone())
                .collect(),
        );
        for section in sections {
            self.sections.insert(section.id.clone(), section);
        }
        self.root_meta.insert(
            root.to_string(),
            RootParse {
                files,
                edges,
                targets: include_targets,
                warnings,
                line_counts,
            },
        );
    }

    /// Recompute the derived maps after one or more roots changed.
    fn rebuild_derived(&mut self) {
        let roots: HashSet<&String> = self.root_files.iter().collect();
        self.included_files = self
            .root_meta
            .values()
            .flat_map(|meta| meta.targets.iter())
            .filter(|target| !roots.contains(*target))
            .cloned()
            .collect();

        self.file_lines = self
            .root_meta
            .values()
            .flat_map(|meta| meta.line_counts.iter())
            .map(|(path, count)| (path.clone(), *count))
            .collect();

        let mut by_file: HashMap<String, Vec<String>> = HashMap::new();
        for section in self.dfs_sections() {
            by_file
                .entry(section.source_file.clone())
                .or_default()
                .push(section.id.clone());
        }
        // Files that parsed but contributed no sections still appear.
        for meta in self.root_meta.values() {
            for file in &meta.files {
                by_file.entry(file.clone()).or_default();
            }
        }
        self.sections_by_file = by_file;
    }
}

/// Builds and refreshes [`ProjectIndex`]es for one project directory.
#[derive(Debug, Clone)]
pub struct Indexer {
    project_root: PathBuf,
}

impl Indexer {
    /// Create an indexer for the given project directory.
    ///
    /// # Errors
    ///
    /// Fails with `not_found` when the directory does not exist.
    pub fn new(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        if !project_root.is_dir() {
            return Err(Error::NotFound(format!(
                "project root is not a directory: {}",
                project_root.display()
            )));
        }
        Ok(Self { project_root })
    }

    /// The project directory this indexer serves.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Full build: discovery, root classification, and a parse of every root.
    ///
    /// # Errors
    ///
    /// Fails when discovery cannot read the project root or a root file
    /// cannot be parsed. Problems inside include targets are warnings on the
    /// returned index, not errors.
    pub fn build(&self) -> Result<ProjectIndex> {
        let discovery = discovery::discover(&self.project_root)?;
        let mut index = ProjectIndex::empty(self.project_root.clone(), discovery.roots);
        let mut ids = IdBuilder::new();
        let parser = MarkupParser::new(&self.project_root);

        for root in index.root_files.clone() {
            let parse = parser.parse(&root)?;
            index.install_root(&root, parse, &mut ids);
        }
        index.rebuild_derived();

        info!(
            roots = index.root_files.len(),
            sections = index.len(),
            "index built"
        );
        Ok(index)
    }

    /// Apply a set of changed paths to an existing index.
    ///
    /// Known files trigger a re-parse of every root that reaches them through
    /// include edges; unknown or vanished paths fall back to a full rebuild.
    /// Applying the same change set twice yields the same index.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Indexer::build`]. A failed re-parse leaves the
    /// index untouched.
    pub fn refresh(&self, index: &mut ProjectIndex, changed: &[String]) -> Result<()> {
        let structural = changed.is_empty()
            || changed
                .iter()
                .any(|path| !index.is_known_file(path) || !self.project_root.join(path).is_file());
        if structural {
            debug!(?changed, "structural change, rebuilding index");
            *index = self.build()?;
            return Ok(());
        }

        let affected: Vec<String> = index
            .root_files
            .iter()
            .filter(|root| {
                index.root_meta.get(*root).is_some_and(|meta| {
                    changed.iter().any(|path| {
                        meta.files.contains(path) || meta.targets.contains(path)
                    })
                })
            })
            .cloned()
            .collect();

        debug!(?changed, ?affected, "targeted refresh");
        for root in &affected {
            self.reparse_root(index, root)?;
        }
        index.rebuild_derived();
        Ok(())
    }

    fn reparse_root(&self, index: &mut ProjectIndex, root: &str) -> Result<()> {
        let parser = MarkupParser::new(&self.project_root);
        let parse = parser.parse(root)?;

        index.drop_root_sections(root);
        let mut ids = IdBuilder::with_taken(index.sections.keys().cloned());
        index.install_root(root, parse, &mut ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(full, content).expect("write fixture");
        }
        dir
    }

    #[test]
    fn build_links_sections_across_roots() {
        let dir = project(&[
            ("alpha.adoc", "= Alpha\n\n== One\n\nbody\n"),
            ("beta.md", "# Beta\n\n## Two\n\ntext\n"),
        ]);
        let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

        assert_eq!(index.root_files(), ["alpha.adoc", "beta.md"]);
        assert_eq!(index.len(), 4);
        assert_eq!(index.top_level("alpha.adoc"), ["alpha"]);
        assert_eq!(
            index.section("alpha").map(|s| s.children.clone()),
            Some(vec!["alpha.one".to_string()])
        );
        assert!(index.integrity_issues().is_empty());
    }

    #[test]
    fn included_file_is_hidden_from_roots() {
        let dir = project(&[
            ("main.adoc", "= Main\n\ninclude::_chap.adoc[]\n"),
            ("_chap.adoc", "== Chap\n\ntext\n"),
        ]);
        let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

        assert_eq!(index.root_files(), ["main.adoc"]);
        assert!(index.included_files().contains("_chap.adoc"));
        let chap = index.section("main.chap").expect("chap indexed");
        assert_eq!(chap.source_file, "_chap.adoc");
        assert_eq!(index.include_edges()["main.adoc"], vec!["_chap.adoc"]);
    }

    #[test]
    fn duplicate_top_levels_across_roots_disambiguate() {
        let dir = project(&[
            ("a.md", "# Intro\n\nfrom a\n"),
            ("b.md", "# Intro\n\nfrom b\n"),
        ]);
        let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

        assert!(index.section("intro").is_some());
        assert!(index.section("intro-2").is_some());
    }

    #[test]
    fn refresh_of_edited_root_replaces_its_sections() {
        let dir = project(&[("main.adoc", "= Intro\n\n== Overview\n\nBody.\n")]);
        let indexer = Indexer::new(dir.path()).expect("indexer");
        let mut index = indexer.build().expect("build");
        assert!(index.section("intro.overview").is_some());

        fs::write(
            dir.path().join("main.adoc"),
            "= Intro\n\n== Summary\n\nBody.\n",
        )
        .expect("rewrite");
        indexer
            .refresh(&mut index, &["main.adoc".to_string()])
            .expect("refresh");

        assert!(index.section("intro.overview").is_none());
        assert!(index.section("intro.summary").is_some());
        assert!(index.integrity_issues().is_empty());
    }

    #[test]
    fn refresh_of_included_file_reparses_the_including_root() {
        let dir = project(&[
            ("main.adoc", "= Main\n\ninclude::_chap.adoc[]\n"),
            ("_chap.adoc", "== Chap\n\ntext\n"),
        ]);
        let indexer = Indexer::new(dir.path()).expect("indexer");
        let mut index = indexer.build().expect("build");

        fs::write(dir.path().join("_chap.adoc"), "== Renamed\n\ntext\n").expect("rewrite");
        indexer
            .refresh(&mut index, &["_chap.adoc".to_string()])
            .expect("refresh");

        assert!(index.section("main.chap").is_none());
        assert!(index.section("main.renamed").is_some());
    }

    #[test]
    fn refresh_with_unknown_path_rediscovers() {
        let dir = project(&[("a.md", "# A\n")]);
        let indexer = Indexer::new(dir.path()).expect("indexer");
        let mut index = indexer.build().expect("build");
        assert_eq!(index.root_files().len(), 1);

        fs::write(dir.path().join("b.md"), "# B\n").expect("new file");
        indexer
            .refresh(&mut index, &["b.md".to_string()])
            .expect("refresh");

        assert_eq!(index.root_files(), ["a.md", "b.md"]);
        assert!(index.section("b").is_some());
    }

    #[test]
    fn creating_a_previously_missing_include_target_heals_the_root() {
        let dir = project(&[("main.adoc", "= Main\n\ninclude::extra.adoc[]\n")]);
        let indexer = Indexer::new(dir.path()).expect("indexer");
        let mut index = indexer.build().expect("build");
        assert_eq!(index.warnings().len(), 1);

        fs::write(dir.path().join("extra.adoc"), "== Extra\n\nnow here\n").expect("new include");
        indexer
            .refresh(&mut index, &["extra.adoc".to_string()])
            .expect("refresh");

        assert!(index.section("main.extra").is_some());
        assert!(index.warnings().is_empty());
    }

    #[test]
    fn refresh_is_idempotent() {
        let dir = project(&[("main.adoc", "= Intro\n\n== Overview\n\nBody.\n")]);
        let indexer = Indexer::new(dir.path()).expect("indexer");
        let mut index = indexer.build().expect("build");

        let changes = vec!["main.adoc".to_string()];
        indexer.refresh(&mut index, &changes).expect("first");
        let ids_once: Vec<String> = index.dfs_sections().iter().map(|s| s.id.clone()).collect();
        indexer.refresh(&mut index, &changes).expect("second");
        let ids_twice: Vec<String> = index.dfs_sections().iter().map(|s| s.id.clone()).collect();

        assert_eq!(ids_once, ids_twice);
    }

    #[test]
    fn consecutive_builds_are_deterministic() {
        let dir = project(&[
            ("z.md", "# Z\n\n## Zed\n\ntext\n"),
            ("a.adoc", "= A\n\n== One\n\nbody\n"),
        ]);
        let indexer = Indexer::new(dir.path()).expect("indexer");

        let first = indexer.build().expect("build 1");
        let second = indexer.build().expect("build 2");

        let ids_first: Vec<String> = first.dfs_sections().iter().map(|s| s.id.clone()).collect();
        let ids_second: Vec<String> = second.dfs_sections().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids_first, ids_second);
        assert_eq!(first.root_files(), second.root_files());
    }

    #[test]
    fn empty_project_builds_empty_index() {
        let dir = TempDir::new().expect("temp dir");
        let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

        assert!(index.is_empty());
        assert!(index.root_files().is_empty());
        assert!(index.integrity_issues().is_empty());
    }

    #[test]
    fn headingless_file_is_still_a_root() {
        let dir = project(&[("notes.md", "prose only\n")]);
        let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

        assert_eq!(index.root_files(), ["notes.md"]);
        assert!(index.is_empty());
        assert_eq!(index.file_info("notes.md").section_count, 0);
    }

    #[test]
    fn missing_project_root_is_not_found() {
        let err = Indexer::new("/definitely/not/here").expect_err("must fail");
        assert_eq!(err.kind(), "not_found");
    }
}
