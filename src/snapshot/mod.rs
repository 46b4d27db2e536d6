//! Restore points for the project workspace.
//!
//! [`SnapshotController`] takes a snapshot before any mutating step runs
//! and restores it when a run fails. Neither operation is ever fatal: a
//! failed `create` leaves the run without rollback, and a failed `restore`
//! is logged so the error that triggered it still reaches the caller.

pub mod git;

use std::path::Path;

use tracing::{error, info, warn};

use crate::error::Result;
use crate::state::MigrationStore;

pub use git::GitSnapshotProvider;

/// Label passed to the provider when snapshotting before a run.
pub const PRE_UPGRADE: &str = "pre-upgrade";

/// Storage label of the snapshot taken before the first mutating step.
pub const INITIAL: &str = "initial";

/// Creates and restores workspace snapshots.
pub trait SnapshotProvider {
    /// Capture the current state of `path` and return an id for it.
    fn create(&self, path: &Path, label: &str) -> Result<String>;

    /// Return `path` to the state captured as `snapshot_id`.
    fn restore(&self, path: &Path, snapshot_id: &str) -> Result<()>;
}

/// Snapshot lifecycle for a migration run.
pub struct SnapshotController<'a> {
    provider: &'a dyn SnapshotProvider,
    store: &'a dyn MigrationStore,
}

impl<'a> SnapshotController<'a> {
    pub fn new(provider: &'a dyn SnapshotProvider, store: &'a dyn MigrationStore) -> Self {
        Self { provider, store }
    }

    /// Snapshot `target` and persist the id under [`INITIAL`].
    ///
    /// Returns `None` if the snapshot could not be taken.
    pub fn create(&self, target: &Path) -> Option<String> {
        let id = match self.provider.create(target, PRE_UPGRADE) {
            Ok(id) => id,
            Err(e) => {
                warn!("Snapshot failed: {}. Proceeding without rollback capability.", e);
                return None;
            }
        };

        info!("Snapshot created: {}", id);
        if let Err(e) = self.store.save_snapshot(INITIAL, &id) {
            warn!("Could not persist snapshot id {}: {}", id, e);
        }
        Some(id)
    }

    /// The persisted [`INITIAL`] snapshot id, if any.
    pub fn persisted(&self) -> Option<String> {
        match self.store.snapshot(INITIAL) {
            Ok(id) => id,
            Err(e) => {
                warn!("Could not read persisted snapshot id: {}", e);
                None
            }
        }
    }

    /// Restore `target` to `snapshot_id`. Returns whether it succeeded.
    pub fn restore(&self, target: &Path, snapshot_id: &str) -> bool {
        info!("Rolling back to snapshot: {}", snapshot_id);
        match self.provider.restore(target, snapshot_id) {
            Ok(()) => {
                info!("Rollback completed");
                true
            }
            Err(e) => {
                error!("Rollback failed: {}", e);
                false
            }
        }
    }
}
