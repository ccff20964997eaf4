//! End-to-end scenarios over a real project directory: build, query, edit,
//! watch, validate.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use doctree_core::{
    query, EditSuppressor, Indexer, InsertPosition, SectionEditor, WarningKind,
};
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
fn basic_parse_yields_structure_and_content() {
    let dir = project(&[("main.adoc", "= Intro\n\nHello.\n\n== Overview\n\nBody.\n")]);
    let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

    let structure = query::get_structure(&index, None);
    assert_eq!(structure.len(), 2);
    assert_eq!(
        (structure[0].id.as_str(), structure[0].level, structure[0].children_count),
        ("intro", 1, 1)
    );
    assert_eq!(structure[0].title, "Intro");
    assert_eq!(
        (structure[1].id.as_str(), structure[1].level, structure[1].children_count),
        ("intro.overview", 2, 0)
    );

    let overview = query::get_section(&index, "intro.overview").expect("section");
    assert_eq!(overview.content, "Body.");
}

#[test]
fn include_resolution_records_the_origin_file() {
    let dir = project(&[
        ("main.adoc", "= Main Title\n\ninclude::_chap.adoc[]\n"),
        ("_chap.adoc", "== Chap\n\ntext\n"),
    ]);
    let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

    let chap = query::get_section(&index, "main-title.chap").expect("section");
    assert_eq!(chap.source_file, "_chap.adoc");
    assert!(index.included_files().contains("_chap.adoc"));

    let roots = query::get_root_files_structure(&index);
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].path, "main.adoc");
}

#[test]
fn update_section_round_trips_through_disk_and_index() {
    let dir = project(&[("main.adoc", "= Intro\n\nHello.\n\n== Overview\n\nBody.\n")]);
    let indexer = Indexer::new(dir.path()).expect("indexer");
    let mut index = indexer.build().expect("build");
    let editor = SectionEditor::new(&indexer);

    let outcome = editor
        .update_section(&mut index, "intro.overview", "New body")
        .expect("update");
    assert!(outcome.success);

    let section = query::get_section(&index, "intro.overview").expect("section");
    assert_eq!(section.content, "New body");

    let on_disk = fs::read_to_string(dir.path().join("main.adoc")).expect("read");
    assert!(on_disk.ends_with("Overview\n\nNew body\n"));
}

#[test]
fn search_finds_body_text_with_snippet() {
    let dir = project(&[("main.adoc", "= Intro\n\nHello.\n\n== Overview\n\nBody.\n")]);
    let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

    let hits = query::search_content(&index, "body").expect("search");
    assert!(hits.iter().any(|hit| hit.id == "intro.overview"));
    let hit = hits
        .iter()
        .find(|hit| hit.id == "intro.overview")
        .expect("overview hit");
    assert!(hit.snippet.contains("Body."));
}

#[tokio::test]
async fn watcher_driven_refresh_picks_up_external_rename() {
    let dir = project(&[("main.adoc", "= Intro\n\n== Overview\n\nBody.\n")]);
    let indexer = Indexer::new(dir.path()).expect("indexer");
    let mut index = indexer.build().expect("build");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _handle = doctree_core::spawn_watcher(
        dir.path().to_path_buf(),
        Arc::new(EditSuppressor::new()),
        tx,
    );
    tokio::time::sleep(Duration::from_millis(300)).await;

    fs::write(
        dir.path().join("main.adoc"),
        "= Intro\n\n== Summary\n\nBody.\n",
    )
    .expect("external edit");

    let batch = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within the debounce window")
        .expect("channel open");
    indexer.refresh(&mut index, &batch).expect("refresh");

    assert!(query::get_section(&index, "intro.summary").is_ok());
    assert!(query::get_section(&index, "intro.overview").is_err());
}

#[test]
fn include_cycle_is_reported_once_without_duplicates() {
    let dir = project(&[
        ("a.adoc", "= A\n\ninclude::b.adoc[]\n"),
        ("b.adoc", "== B\n\ninclude::a.adoc[]\n"),
    ]);
    let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

    let report = query::validate_structure(&index);
    let cycles: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::Cycle)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].file, "b.adoc");

    // Neither file's sections are duplicated.
    let structure = query::get_structure(&index, None);
    let ids: Vec<&str> = structure.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "a.b"]);
}

#[test]
fn every_section_reparses_from_its_origin_file() {
    let dir = project(&[
        ("main.adoc", "= Main\n\nlead\n\ninclude::_chap.adoc[]\n"),
        ("_chap.adoc", "== Chap\n\ntext\n\n=== Deep\n\nmore\n"),
    ]);
    let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");
    let parser = doctree_core::MarkupParser::new(dir.path());

    for entry in query::get_structure(&index, None) {
        let section = query::get_section(&index, &entry.id).expect("section");
        let isolated = parser.parse(&section.source_file).expect("isolated parse");
        assert!(
            isolated.sections.iter().any(|raw| {
                raw.level == section.level
                    && raw.title == section.title
                    && raw.heading_line == section.line_start
            }),
            "section '{}' not found in isolated parse of {}",
            entry.id,
            section.source_file
        );
    }
}

#[test]
fn editing_keeps_the_whole_pipeline_consistent() {
    let dir = project(&[(
        "handbook.md",
        "# Handbook\n\nwelcome\n\n## Setup\n\nsteps\n",
    )]);
    let indexer = Indexer::new(dir.path()).expect("indexer");
    let mut index = indexer.build().expect("build");
    let editor = SectionEditor::new(&indexer);

    editor
        .insert_section(
            &mut index,
            "handbook",
            "Usage",
            "run it",
            InsertPosition::Append,
        )
        .expect("insert");
    editor
        .update_section(&mut index, "handbook.setup", "better steps")
        .expect("update");

    let structure = query::get_structure(&index, None);
    let ids: Vec<&str> = structure.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["handbook", "handbook.setup", "handbook.usage"]);

    let report = query::validate_structure(&index);
    assert!(report.valid, "issues: {:?}", report.issues);
    assert!(query::get_dependencies(&index).orphaned_sections.is_empty());
}

#[test]
fn duplicate_titles_number_from_two() {
    let dir = project(&[(
        "faq.md",
        "# FAQ\n\n## Question\n\nfirst\n\n## Question\n\nsecond\n\n## Question\n\nthird\n",
    )]);
    let index = Indexer::new(dir.path()).expect("indexer").build().expect("build");

    assert!(index.section("faq.question").is_some());
    assert_eq!(
        index.section("faq.question-2").map(|s| s.content.clone()),
        Some("second".to_string())
    );
    assert_eq!(
        index.section("faq.question-3").map(|s| s.content.clone()),
        Some("third".to_string())
    );
}
