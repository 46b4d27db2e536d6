//! Persistent migration state.
//!
//! [`MigrationStore`] is the storage contract the orchestrator and the
//! report handler use. [`StateStore`] keeps one YAML file per project
//! under the Leapfrog home directory; [`MemoryStore`] keeps everything in
//! memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LeapfrogError, Result};
use crate::plan::Step;

use super::{ProjectId, RunRecord};

/// Storage for task records, snapshot ids and run history.
pub trait MigrationStore {
    /// Replace the recorded step list.
    fn save_tasks(&self, steps: &[Step]) -> Result<()>;

    /// The recorded step list with its last known statuses.
    fn all_tasks(&self) -> Result<Vec<Step>>;

    /// Record a snapshot id under a label.
    fn save_snapshot(&self, label: &str, snapshot_id: &str) -> Result<()>;

    /// Snapshot id recorded under a label.
    fn snapshot(&self, label: &str) -> Result<Option<String>>;

    /// Append a finished run to the history.
    fn record_run(&self, record: RunRecord) -> Result<()>;
}

/// Persisted state for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    /// Schema version for migration.
    pub version: u32,

    /// Project identification.
    pub project: ProjectInfo,

    /// When the task list was last written.
    pub updated_at: Option<DateTime<Utc>>,

    /// Steps of the current or most recent run.
    #[serde(default)]
    pub tasks: Vec<Step>,

    /// Snapshot ids by label.
    #[serde(default)]
    pub snapshots: BTreeMap<String, String>,

    /// Run history (most recent first).
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

/// Project information stored in state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub path: String,
    pub git_remote: Option<String>,
    pub name: String,
}

impl ProjectState {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Create empty state for a project.
    pub fn new(project_id: &ProjectId) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            project: ProjectInfo {
                path: project_id.path().to_string_lossy().to_string(),
                git_remote: project_id.git_remote().map(String::from),
                name: project_id.name().to_string(),
            },
            updated_at: None,
            tasks: Vec::new(),
            snapshots: BTreeMap::new(),
            runs: Vec::new(),
        }
    }

    /// Load state from a file, or create empty state if it does not exist.
    pub fn load(path: &Path, project_id: &ProjectId) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(project_id));
        }

        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| LeapfrogError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save state using an atomic write.
    ///
    /// Writes to a temp file and renames it over the target, so the state
    /// file is never partially written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content =
            serde_yaml::to_string(self).map_err(|e| LeapfrogError::ConfigValidationError {
                message: format!("Failed to serialize state: {}", e),
            })?;

        let temp_path = path.with_extension("yml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Get the most recent run.
    pub fn last_run(&self) -> Option<&RunRecord> {
        self.runs.first()
    }

    /// Prune old run history.
    pub fn prune_history(&mut self, keep: usize) {
        self.runs.truncate(keep);
    }
}

/// File-backed [`MigrationStore`] for one project.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: RefCell<ProjectState>,
}

impl StateStore {
    /// Default number of runs to keep.
    pub const DEFAULT_HISTORY_RETENTION: usize = 50;

    /// Open the store for a project under the Leapfrog home directory.
    pub fn open(project_id: &ProjectId) -> Result<Self> {
        Self::open_in(&crate::config::leapfrog_home(), project_id)
    }

    /// Open the store for a project under a given home directory.
    pub fn open_in(home: &Path, project_id: &ProjectId) -> Result<Self> {
        let path = Self::state_file(home, project_id);
        let state = ProjectState::load(&path, project_id)?;
        Ok(Self {
            path,
            state: RefCell::new(state),
        })
    }

    /// Get the state directory for a project.
    pub fn state_dir(home: &Path, project_id: &ProjectId) -> PathBuf {
        home.join("projects").join(project_id.hash())
    }

    /// Get the state file path.
    pub fn state_file(home: &Path, project_id: &ProjectId) -> PathBuf {
        Self::state_dir(home, project_id).join("state.yml")
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current state.
    pub fn state(&self) -> ProjectState {
        self.state.borrow().clone()
    }

    fn update(&self, change: impl FnOnce(&mut ProjectState)) -> Result<()> {
        let mut state = self.state.borrow_mut();
        change(&mut *state);
        state.save(&self.path)
    }
}

impl MigrationStore for StateStore {
    fn save_tasks(&self, steps: &[Step]) -> Result<()> {
        self.update(|state| {
            state.tasks = steps.to_vec();
            state.updated_at = Some(Utc::now());
        })
    }

    fn all_tasks(&self) -> Result<Vec<Step>> {
        Ok(self.state.borrow().tasks.clone())
    }

    fn save_snapshot(&self, label: &str, snapshot_id: &str) -> Result<()> {
        self.update(|state| {
            state
                .snapshots
                .insert(label.to_string(), snapshot_id.to_string());
        })
    }

    fn snapshot(&self, label: &str) -> Result<Option<String>> {
        Ok(self.state.borrow().snapshots.get(label).cloned())
    }

    fn record_run(&self, record: RunRecord) -> Result<()> {
        self.update(|state| {
            state.runs.insert(0, record);
            state.prune_history(Self::DEFAULT_HISTORY_RETENTION);
        })
    }
}

/// In-memory [`MigrationStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RefCell<Vec<Step>>,
    snapshots: RefCell<BTreeMap<String, String>>,
    runs: RefCell<Vec<RunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded runs, most recent first.
    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.borrow().clone()
    }
}

impl MigrationStore for MemoryStore {
    fn save_tasks(&self, steps: &[Step]) -> Result<()> {
        *self.tasks.borrow_mut() = steps.to_vec();
        Ok(())
    }

    fn all_tasks(&self) -> Result<Vec<Step>> {
        Ok(self.tasks.borrow().clone())
    }

    fn save_snapshot(&self, label: &str, snapshot_id: &str) -> Result<()> {
        self.snapshots
            .borrow_mut()
            .insert(label.to_string(), snapshot_id.to_string());
        Ok(())
    }

    fn snapshot(&self, label: &str) -> Result<Option<String>> {
        Ok(self.snapshots.borrow().get(label).cloned())
    }

    fn record_run(&self, record: RunRecord) -> Result<()> {
        self.runs.borrow_mut().insert(0, record);
        Ok(())
    }
}
