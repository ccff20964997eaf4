//! Stable dotted identifiers for sections.
//!
//! Transforms the parser's flat record sequence into [`Section`]s with
//! slug-based identifiers and parent/child links. Nesting follows a level
//! stack: each record's parent is the nearest preceding record of strictly
//! shallower level, and its id is the parent's id plus its own slug.

use std::collections::HashSet;

use crate::{RawSection, Section};

/// Normalize a heading title into an identifier segment.
///
/// Lowercases the title, replaces every maximal run of characters outside
/// `[a-z0-9]` with a single `-`, and strips leading/trailing dashes. An empty
/// result falls back to `section`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;

    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

/// Assigns unique dotted identifiers across one or more parse runs.
///
/// The builder remembers every id it has handed out, so feeding it the roots
/// of a project one after another keeps identifiers globally unique. Within
/// the same parent, a duplicate slug gets `-2`, `-3`, … appended — the
/// parent prefix makes the per-parent counter equivalent to a membership
/// check against the global set.
#[derive(Debug, Default)]
pub struct IdBuilder {
    taken: HashSet<String>,
}

impl IdBuilder {
    /// Fresh builder with no reserved identifiers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder that treats the given identifiers as already taken. Used by
    /// targeted refreshes, where sections of untouched roots keep their ids.
    pub fn with_taken<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self {
            taken: ids.into_iter().collect(),
        }
    }

    /// Turn a flat record sequence into linked sections with identifiers.
    pub fn build(&mut self, records: Vec<RawSection>) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::with_capacity(records.len());
        let mut stack: Vec<usize> = Vec::new();

        for record in records {
            while let Some(&top) = stack.last() {
                if sections[top].level >= record.level {
                    stack.pop();
                } else {
                    break;
                }
            }

            let parent_idx = stack.last().copied();
            let parent_id = parent_idx.map(|idx| sections[idx].id.clone());
            let slug = slugify(&record.title);
            let candidate = match &parent_id {
                Some(parent) => format!("{parent}.{slug}"),
                None => slug,
            };
            let id = self.claim(candidate);

            if let Some(idx) = parent_idx {
                sections[idx].children.push(id.clone());
            }

            sections.push(Section {
                id,
                title: record.title,
                level: record.level,
                content: record.content,
                source_file: record.origin_file,
                line_start: record.heading_line,
                line_end: record.body_end,
                parent_id,
                children: Vec::new(),
            });
            stack.push(sections.len() - 1);
        }

        sections
    }

    fn claim(&mut self, candidate: String) -> String {
        let id = if self.taken.contains(&candidate) {
            let mut counter = 2;
            loop {
                let numbered = format!("{candidate}-{counter}");
                if !self.taken.contains(&numbered) {
                    break numbered;
                }
                counter += 1;
            }
        } else {
            candidate
        };

        self.taken.insert(id.clone());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(level: usize, title: &str) -> RawSection {
        RawSection {
            level,
            title: title.to_string(),
            origin_file: "main.adoc".to_string(),
            heading_line: 0,
            content: String::new(),
            body_end: 0,
        }
    }

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  API -- Reference!  "), "api-reference");
        assert_eq!(slugify("1. Einführung"), "1-einf-hrung");
        assert_eq!(slugify("???"), "section");
        assert_eq!(slugify("CamelCase"), "camelcase");
    }

    #[test]
    fn nesting_follows_level_stack() {
        let mut builder = IdBuilder::new();
        let sections = builder.build(vec![
            record(1, "Intro"),
            record(2, "Overview"),
            record(3, "Detail"),
            record(2, "Usage"),
        ]);

        let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["intro", "intro.overview", "intro.overview.detail", "intro.usage"]);
        assert_eq!(sections[0].children, vec!["intro.overview", "intro.usage"]);
        assert_eq!(sections[1].parent_id.as_deref(), Some("intro"));
        assert_eq!(sections[3].parent_id.as_deref(), Some("intro"));
    }

    #[test]
    fn level_jumps_attach_to_nearest_shallower_ancestor() {
        let mut builder = IdBuilder::new();
        let sections = builder.build(vec![record(1, "Top"), record(4, "Deep"), record(2, "Back")]);

        assert_eq!(sections[1].id, "top.deep");
        assert_eq!(sections[2].id, "top.back");
        assert_eq!(sections[0].children, vec!["top.deep", "top.back"]);
    }

    #[test]
    fn duplicate_titles_get_numbered_suffixes() {
        let mut builder = IdBuilder::new();
        let sections = builder.build(vec![
            record(1, "Doc"),
            record(2, "Notes"),
            record(2, "Notes"),
            record(2, "Notes"),
        ]);

        let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["doc", "doc.notes", "doc.notes-2", "doc.notes-3"]);
    }

    #[test]
    fn duplicates_under_different_parents_do_not_collide() {
        let mut builder = IdBuilder::new();
        let sections = builder.build(vec![
            record(1, "A"),
            record(2, "Notes"),
            record(1, "B"),
            record(2, "Notes"),
        ]);

        let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a.notes", "b", "b.notes"]);
    }

    #[test]
    fn reserved_ids_from_other_roots_are_respected() {
        let mut builder = IdBuilder::with_taken(["intro".to_string()]);
        let sections = builder.build(vec![record(1, "Intro")]);

        assert_eq!(sections[0].id, "intro-2");
    }

    proptest! {
        #[test]
        fn slugs_use_only_identifier_characters(title in ".{0,80}") {
            let slug = slugify(&title);
            prop_assert!(!slug.is_empty());
            prop_assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
        }

        #[test]
        fn slugify_is_idempotent(title in ".{0,80}") {
            let once = slugify(&title);
            prop_assert_eq!(slugify(&once), once);
        }
    }
}
