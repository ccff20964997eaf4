//! Filesystem watching with debounce and self-edit suppression.
//!
//! A dedicated thread runs the debounced watcher and forwards batches of
//! changed project-relative paths over a tokio channel; a single consumer
//! task feeds them to the indexer. The watcher itself holds no lock on the
//! index.
//!
//! When the editor persists a change it records the path and resulting mtime
//! in the shared [`EditSuppressor`]; the watcher consults it to discard the
//! echo event of our own write. If the underlying watch drops, the thread
//! reinitializes and requests a full re-discovery by sending an empty batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::Dialect;

/// Coalescing window for filesystem events on the same path.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// How long a recorded self-edit suppresses matching watcher events.
pub const SUPPRESSION_TTL: Duration = Duration::from_secs(2);

/// Short-lived map of paths the editor just wrote, with the mtime the write
/// produced. Entries expire after [`SUPPRESSION_TTL`].
#[derive(Debug, Default)]
pub struct EditSuppressor {
    entries: Mutex<HashMap<String, (Option<SystemTime>, Instant)>>,
}

impl EditSuppressor {
    /// Empty suppressor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the editor just wrote `rel_path`, producing `mtime`.
    pub fn record(&self, rel_path: &str, mtime: Option<SystemTime>) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(rel_path.to_string(), (mtime, Instant::now()));
    }

    /// Whether an event for `rel_path` with the observed `mtime` is the echo
    /// of our own write. Consumes the entry when it matches.
    pub fn should_suppress(&self, rel_path: &str, mtime: Option<SystemTime>) -> bool {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, (_, recorded)| recorded.elapsed() < SUPPRESSION_TTL);

        let matches = entries
            .get(rel_path)
            .is_some_and(|(recorded_mtime, _)| match (recorded_mtime, &mtime) {
                (Some(recorded), Some(observed)) => recorded == observed,
                _ => true,
            });
        if matches {
            entries.remove(rel_path);
        }
        matches
    }
}

/// Keeps the watcher thread alive for the lifetime of the handle.
#[derive(Debug)]
pub struct WatchHandle {
    _thread: std::thread::JoinHandle<()>,
}

/// Start watching a project directory recursively.
///
/// Batches of changed project-relative markup paths are sent over `tx`; an
/// empty batch asks the consumer for a full re-discovery. The thread exits
/// when the receiving side is dropped.
#[must_use]
pub fn spawn_watcher(
    project_root: PathBuf,
    suppressor: std::sync::Arc<EditSuppressor>,
    tx: UnboundedSender<Vec<String>>,
) -> WatchHandle {
    let thread = std::thread::spawn(move || loop {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut debouncer = match new_debouncer(DEBOUNCE_WINDOW, notify_tx) {
            Ok(debouncer) => debouncer,
            Err(e) => {
                error!(error = %e, "failed to create filesystem watcher");
                if tx.send(Vec::new()).is_err() {
                    return;
                }
                std::thread::sleep(Duration::from_secs(1));
                continue;
            },
        };
        if let Err(e) = debouncer.watcher().watch(
            &project_root,
            notify_debouncer_mini::notify::RecursiveMode::Recursive,
        ) {
            error!(error = %e, "failed to watch project root");
            if tx.send(Vec::new()).is_err() {
                return;
            }
            std::thread::sleep(Duration::from_secs(1));
            continue;
        }
        debug!(root = %project_root.display(), "watching for changes");

        loop {
            match notify_rx.recv() {
                Ok(Ok(events)) => {
                    let batch = collect_batch(&project_root, &suppressor, &events);
                    if !batch.is_empty() && tx.send(batch).is_err() {
                        return;
                    }
                },
                Ok(Err(e)) => warn!(error = %e, "watch error"),
                // Debouncer went away; reinitialize and ask for a full
                // re-discovery in case events were lost.
                Err(_) => break,
            }
        }
        if tx.send(Vec::new()).is_err() {
            return;
        }
    });

    WatchHandle { _thread: thread }
}

fn collect_batch(
    project_root: &Path,
    suppressor: &EditSuppressor,
    events: &[notify_debouncer_mini::DebouncedEvent],
) -> Vec<String> {
    let mut batch = Vec::new();
    for event in events {
        if !matches!(event.kind, DebouncedEventKind::Any) {
            continue;
        }
        if Dialect::from_path(&event.path).is_none() {
            continue;
        }
        let Ok(rel) = event.path.strip_prefix(project_root) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");

        let mtime = std::fs::metadata(&event.path)
            .and_then(|meta| meta.modified())
            .ok();
        if suppressor.should_suppress(&rel, mtime) {
            debug!(path = rel, "suppressed self-edit echo");
            continue;
        }
        if !batch.contains(&rel) {
            batch.push(rel);
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn suppressor_discards_matching_echo_once() {
        let suppressor = EditSuppressor::new();
        let mtime = Some(SystemTime::now());

        suppressor.record("docs/main.adoc", mtime);
        assert!(suppressor.should_suppress("docs/main.adoc", mtime));
        // The entry is consumed; a second event for the path is real.
        assert!(!suppressor.should_suppress("docs/main.adoc", mtime));
    }

    #[test]
    fn suppressor_ignores_other_paths_and_mtimes() {
        let suppressor = EditSuppressor::new();
        let written = Some(SystemTime::UNIX_EPOCH);
        let external = Some(SystemTime::now());

        suppressor.record("a.md", written);
        assert!(!suppressor.should_suppress("b.md", written));
        assert!(!suppressor.should_suppress("a.md", external));
    }

    #[tokio::test]
    async fn watcher_reports_external_markup_edits() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("doc.md"), "# Doc\n").expect("seed");

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _handle = spawn_watcher(dir.path().to_path_buf(), Arc::new(EditSuppressor::new()), tx);

        // Give the watcher a moment to start, then edit.
        tokio::time::sleep(Duration::from_millis(300)).await;
        std::fs::write(dir.path().join("doc.md"), "# Doc\n\nchanged\n").expect("edit");

        let batch = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher produced a batch in time")
            .expect("channel open");
        assert!(batch.is_empty() || batch.contains(&"doc.md".to_string()));
    }
}
