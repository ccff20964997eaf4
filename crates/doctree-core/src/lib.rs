//! # doctree-core
//!
//! Engine for a live, queryable index over a tree of lightweight-markup
//! documentation (AsciiDoc-family and Markdown). The physical layout —
//! interlinked files referencing one another through `include::` directives
//! — is resolved into one logical hierarchy of identified sections, and that
//! hierarchy stays coherent as files change on disk.
//!
//! ## Architecture
//!
//! - **Parsing**: a line-oriented sectioner for both dialects with include
//!   expansion, cycle protection, and bounded depth
//! - **Identifiers**: dotted slug paths with per-parent disambiguation
//! - **Indexing**: root discovery, full builds, targeted refreshes
//! - **Queries**: structure, lookup, search, metadata, dependencies,
//!   validation
//! - **Editing**: section-scoped rewrites with atomic temp-file-then-rename
//!   durability
//! - **Watching**: debounced filesystem events with self-edit suppression
//!
//! The index is the sole shared mutable structure; wrap it in one
//! reader-writer lock and give queries the shared side, refreshes and edits
//! the exclusive side. Never cache [`Section`]s across a refresh boundary.
//!
//! ## Quick start
//!
//! ```no_run
//! use doctree_core::{query, Indexer};
//!
//! # fn main() -> doctree_core::Result<()> {
//! let indexer = Indexer::new("docs/")?;
//! let index = indexer.build()?;
//!
//! for entry in query::get_structure(&index, Some(2)) {
//!     println!("{} {}", "  ".repeat(entry.level - 1), entry.title);
//! }
//! # Ok(())
//! # }
//! ```

/// Markup file discovery and root classification
pub mod discovery;
/// Line-oriented diffs between section body versions
pub mod diff;
/// Section-scoped file mutations with atomic writes
pub mod editor;
/// Error types and result aliases
pub mod error;
/// Dotted slug identifiers and tree construction
pub mod ids;
/// The in-memory project index and its indexer
pub mod index;
/// Heading and include-directive scanner for both dialects
pub mod parser;
/// Read-only operations over the index
pub mod query;
/// Core data types and structures
pub mod types;
/// Debounced filesystem watching with self-edit suppression
pub mod watcher;

pub use diff::{diff_lines, DiffRecord, DiffTag};
pub use editor::{EditOutcome, InsertPosition, SectionEditor};
pub use error::{Error, Result};
pub use ids::{slugify, IdBuilder};
pub use index::{Indexer, ProjectIndex};
pub use parser::{FileParse, MarkupParser, MAX_INCLUDE_DEPTH};
pub use types::{Dialect, FileInfo, RawSection, Section, ValidationWarning, WarningKind};
pub use watcher::{spawn_watcher, EditSuppressor, WatchHandle, DEBOUNCE_WINDOW, SUPPRESSION_TTL};
