//! Migration step records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a migration step.
///
/// `Completed`, `Failed` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Whether no further transition is possible from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        };
        f.write_str(label)
    }
}

/// One unit of migration work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Unique id within a run.
    pub id: String,
    /// Free-form step type, e.g. `DEPENDENCY_UPGRADE`.
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Ids of steps that must complete first.
    #[serde(default)]
    pub dependency_ids: Vec<String>,
    /// Current status.
    #[serde(default)]
    pub status: StepStatus,
    /// Name of the handler that runs this step.
    pub handler_name: String,
    /// Handler-specific input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Step {
    /// Create a pending step with no dependencies and no payload.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
        handler_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            description: description.into(),
            dependency_ids: Vec::new(),
            status: StepStatus::Pending,
            handler_name: handler_name.into(),
            payload: None,
        }
    }

    /// Add dependencies.
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}
