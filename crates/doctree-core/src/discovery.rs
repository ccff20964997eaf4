//! Markup file discovery and root classification.
//!
//! Discovery enumerates every markup file under the project root, then scans
//! each one in isolation for `include::` targets. A discovered file is a
//! *root* iff no other discovered file includes it; roots drive the full
//! parse and everything else hangs off them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use tracing::warn;

use crate::parser::MarkupParser;
use crate::{Dialect, Result};

/// Directory names that are never descended into. Names starting with `.`
/// are skipped as well.
const EXCLUDED_DIRS: &[&str] = &[".git", ".venv", "venv", "node_modules"];

/// Outcome of the discovery pass.
#[derive(Debug, Default)]
pub struct Discovery {
    /// All discovered markup files, sorted, project-relative.
    pub files: Vec<String>,
    /// The subset classified as roots, sorted.
    pub roots: Vec<String>,
    /// Include targets per discovered file, in textual order.
    pub targets_by_file: BTreeMap<String, Vec<String>>,
}

/// Enumerate markup files and classify roots.
///
/// Files whose name begins with `_` (partials by convention) are excluded
/// from discovery — they are never roots — but they remain perfectly valid
/// include targets.
///
/// A set of files that only include each other would otherwise leave no root
/// at all; the lexicographically first file of each such cluster is promoted
/// to a root so its content still reaches the index (and its cycle warning
/// reaches `validate_structure`).
///
/// # Errors
///
/// Fails when the project root cannot be read.
pub fn discover(project_root: &Path) -> Result<Discovery> {
    let mut files = Vec::new();
    walk(project_root, Path::new(""), &mut files)?;
    files.sort();

    let parser = MarkupParser::new(project_root);
    let mut targets_by_file = BTreeMap::new();
    let mut included: HashSet<String> = HashSet::new();

    for file in &files {
        match parser.include_targets(file) {
            Ok(targets) => {
                included.extend(targets.iter().cloned());
                targets_by_file.insert(file.clone(), targets);
            },
            Err(e) => {
                warn!(file, error = %e, "skipping include scan");
                targets_by_file.insert(file.clone(), Vec::new());
            },
        }
    }

    let mut roots: Vec<String> = files
        .iter()
        .filter(|file| !included.contains(*file))
        .cloned()
        .collect();

    // Promote one member per unreachable include cluster.
    loop {
        let reachable = reachable_from(&roots, &targets_by_file);
        let Some(stranded) = files.iter().find(|f| !reachable.contains(*f)) else {
            break;
        };
        roots.push(stranded.clone());
        roots.sort();
    }

    Ok(Discovery {
        files,
        roots,
        targets_by_file,
    })
}

fn reachable_from(
    roots: &[String],
    targets_by_file: &BTreeMap<String, Vec<String>>,
) -> BTreeSet<String> {
    let mut reachable: BTreeSet<String> = roots.iter().cloned().collect();
    let mut queue: Vec<String> = roots.to_vec();

    while let Some(file) = queue.pop() {
        if let Some(targets) = targets_by_file.get(&file) {
            for target in targets {
                if reachable.insert(target.clone()) {
                    queue.push(target.clone());
                }
            }
        }
    }

    reachable
}

fn walk(project_root: &Path, rel: &Path, out: &mut Vec<String>) -> Result<()> {
    let dir = project_root.join(rel);
    let entries = std::fs::read_dir(&dir)?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unreadable directory entry");
                continue;
            },
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel_child = rel.join(&name);
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                warn!(path = %rel_child.display(), error = %e, "cannot stat entry");
                continue;
            },
        };

        if file_type.is_dir() {
            if name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_str()) {
                continue;
            }
            walk(project_root, &rel_child, out)?;
        } else if file_type.is_file()
            && !name.starts_with('_')
            && Dialect::from_path(Path::new(&name)).is_some()
        {
            out.push(rel_child.to_string_lossy().replace('\\', "/"));
        }
    }

    Ok(())
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
    fn finds_markup_files_recursively() {
        let dir = project(&[
            ("a.adoc", "= A\n"),
            ("sub/b.md", "# B\n"),
            ("sub/c.txt", "ignored\n"),
            ("_partial.adoc", "= P\n"),
        ]);
        let discovery = discover(dir.path()).expect("discover");

        assert_eq!(discovery.files, vec!["a.adoc", "sub/b.md"]);
        assert_eq!(discovery.roots, vec!["a.adoc", "sub/b.md"]);
    }

    #[test]
    fn excluded_directories_are_skipped() {
        let dir = project(&[
            ("docs.adoc", "= Docs\n"),
            (".git/blob.md", "# nope\n"),
            ("node_modules/pkg/readme.md", "# nope\n"),
            (".hidden/notes.md", "# nope\n"),
            ("venv/lib.md", "# nope\n"),
        ]);
        let discovery = discover(dir.path()).expect("discover");

        assert_eq!(discovery.files, vec!["docs.adoc"]);
    }

    #[test]
    fn included_files_are_not_roots() {
        let dir = project(&[
            ("main.adoc", "= Main\n\ninclude::chapter.adoc[]\n"),
            ("chapter.adoc", "== Chap\n"),
        ]);
        let discovery = discover(dir.path()).expect("discover");

        assert_eq!(discovery.files, vec!["chapter.adoc", "main.adoc"]);
        assert_eq!(discovery.roots, vec!["main.adoc"]);
    }

    #[test]
    fn mutual_include_cluster_promotes_one_root() {
        let dir = project(&[
            ("a.adoc", "= A\n\ninclude::b.adoc[]\n"),
            ("b.adoc", "= B\n\ninclude::a.adoc[]\n"),
        ]);
        let discovery = discover(dir.path()).expect("discover");

        assert_eq!(discovery.roots, vec!["a.adoc"]);
    }

    #[test]
    fn empty_project_discovers_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let discovery = discover(dir.path()).expect("discover");

        assert!(discovery.files.is_empty());
        assert!(discovery.roots.is_empty());
    }
}
