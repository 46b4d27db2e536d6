//! Run history recording.
//!
//! A [`RunRecord`] summarises one migration run. [`RunHistoryBuilder`] is
//! started before the run and finished from the final workflow state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorClassification;
use crate::plan::{MigrationContext, StepStatus};
use crate::runner::{Phase, WorkflowState};

/// A record of a single migration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the run started.
    pub timestamp: DateTime<Utc>,

    /// Version the run started from.
    pub from_version: Option<String>,

    /// Version the run targeted.
    pub target_version: Option<String>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Overall status.
    pub status: RunStatus,

    pub dry_run: bool,

    /// Steps that completed.
    #[serde(default)]
    pub steps_completed: Vec<String>,

    /// Steps that failed.
    #[serde(default)]
    pub steps_failed: Vec<String>,

    /// Steps that were skipped.
    #[serde(default)]
    pub steps_skipped: Vec<String>,

    /// Last error message, if any step failed.
    pub error: Option<String>,

    /// Classification of the last error.
    pub classification: Option<ErrorClassification>,

    /// Whether the workspace was restored from a snapshot.
    #[serde(default)]
    pub rolled_back: bool,
}

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every step completed.
    Success,
    /// The run completed but some steps failed or were skipped.
    Partial,
    /// The run stopped on a fatal error.
    Failed,
}

/// Helper for building a run record.
pub struct RunHistoryBuilder {
    from_version: Option<String>,
    target_version: Option<String>,
    dry_run: bool,
    start_time: DateTime<Utc>,
    rolled_back: bool,
}

impl RunHistoryBuilder {
    /// Start a new run record.
    pub fn start(context: &MigrationContext) -> Self {
        Self {
            from_version: context.current_version.clone(),
            target_version: context.target_version.clone(),
            dry_run: context.dry_run,
            start_time: Utc::now(),
            rolled_back: false,
        }
    }

    /// Mark the workspace as restored from its snapshot.
    pub fn rolled_back(&mut self, rolled_back: bool) {
        self.rolled_back = rolled_back;
    }

    /// Finish from the final workflow state.
    pub fn finish(self, state: &WorkflowState) -> RunRecord {
        let ids = |status: StepStatus| -> Vec<String> {
            state
                .steps()
                .iter()
                .filter(|s| s.status == status)
                .map(|s| s.id.clone())
                .collect()
        };

        let status = match state.phase() {
            Phase::Completed if !state.is_partial_success() => RunStatus::Success,
            Phase::Completed => RunStatus::Partial,
            _ => RunStatus::Failed,
        };

        RunRecord {
            timestamp: self.start_time,
            from_version: self.from_version,
            target_version: self.target_version,
            duration_ms: (Utc::now() - self.start_time).num_milliseconds().max(0) as u64,
            status,
            dry_run: self.dry_run,
            steps_completed: ids(StepStatus::Completed),
            steps_failed: ids(StepStatus::Failed),
            steps_skipped: ids(StepStatus::Skipped),
            error: state.last_error().map(|e| e.message.clone()),
            classification: state.last_error().map(|e| e.classification),
            rolled_back: self.rolled_back,
        }
    }
}
