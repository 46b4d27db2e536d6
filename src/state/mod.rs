//! Migration state storage.
//!
//! Task records, snapshot ids and run history for a project, behind the
//! [`MigrationStore`] contract.

pub mod history;
pub mod project;
pub mod store;

pub use history::{RunHistoryBuilder, RunRecord, RunStatus};
pub use project::ProjectId;
pub use store::{MemoryStore, MigrationStore, ProjectInfo, ProjectState, StateStore};
