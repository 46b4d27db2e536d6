//! Context handed to the planner and to every step handler.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What is being migrated, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationContext {
    /// Root of the project workspace.
    pub project_root: PathBuf,
    /// Version the project is on today.
    pub current_version: Option<String>,
    /// Version the project should end on.
    pub target_version: Option<String>,
    /// Report what would change without mutating the workspace.
    pub dry_run: bool,
    /// Escalate unresolved dependency conflicts to failures.
    pub strict: bool,
}

impl MigrationContext {
    /// Create a context for a project root.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            current_version: None,
            target_version: None,
            dry_run: false,
            strict: false,
        }
    }

    /// Set the version the project is on.
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = Some(version.into());
        self
    }

    /// Set the version to migrate to.
    pub fn with_target_version(mut self, version: impl Into<String>) -> Self {
        self.target_version = Some(version.into());
        self
    }

    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set strict conflict handling.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}
