//! Shared server state: the engine plus the index lock.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use doctree_core::{EditSuppressor, Indexer, ProjectIndex};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::McpResult;

/// Everything the transports share.
///
/// The [`ProjectIndex`] is the sole shared mutable structure: queries take
/// the read side of the lock for their whole duration, refreshes and edits
/// take the write side, so readers see either the pre- or post-refresh
/// state, never a partial one.
pub struct ServerState {
    /// Engine for full builds and targeted refreshes.
    pub indexer: Indexer,
    /// The live index, guarded by a single reader-writer lock.
    pub index: RwLock<ProjectIndex>,
    /// Self-edit suppression map shared with the watcher.
    pub suppressor: Arc<EditSuppressor>,
    /// Set by `initialize`; `tools/call` is rejected until then.
    pub initialized: AtomicBool,
}

/// Shared handle passed to transports and background tasks.
pub type SharedState = Arc<ServerState>;

impl ServerState {
    /// Index the project and wrap everything for sharing.
    ///
    /// # Errors
    ///
    /// Fails when the project root does not exist or the initial build
    /// cannot read a root file.
    pub fn new(project_root: &Path) -> McpResult<SharedState> {
        let indexer = Indexer::new(project_root)?;
        let index = indexer.build()?;

        Ok(Arc::new(Self {
            indexer,
            index: RwLock::new(index),
            suppressor: Arc::new(EditSuppressor::new()),
            initialized: AtomicBool::new(false),
        }))
    }

    /// Apply a batch of changed paths from the watcher. An empty batch asks
    /// for a full re-discovery.
    ///
    /// # Errors
    ///
    /// Propagates indexer failures; the index keeps its previous state.
    pub async fn refresh_paths(&self, changed: &[String]) -> McpResult<()> {
        let mut index = self.index.write().await;
        self.indexer.refresh(&mut index, changed)?;
        debug!(?changed, sections = index.len(), "index refreshed");
        Ok(())
    }
}
