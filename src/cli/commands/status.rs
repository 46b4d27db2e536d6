//! Status command implementation.
//!
//! The `leapfrog status` command shows the steps and last run recorded
//! for the project.

use crate::error::Result;
use crate::snapshot::INITIAL;
use crate::state::{ProjectId, ProjectState, RunRecord, RunStatus, StateStore};
use crate::ui::{format_duration, format_relative_time, UserInterface};

use super::dispatcher::{Command, CommandResult, ProjectTarget};
use super::display;

/// The status command implementation.
pub struct StatusCommand {
    target: ProjectTarget,
}

impl StatusCommand {
    /// Create a new status command.
    pub fn new(target: ProjectTarget) -> Self {
        Self { target }
    }
}

/// One-line summary of a run record.
pub fn describe_run(run: &RunRecord) -> String {
    let status = match run.status {
        RunStatus::Success => "succeeded",
        RunStatus::Partial => "partially succeeded",
        RunStatus::Failed => "failed",
    };
    let versions = match (&run.from_version, &run.target_version) {
        (Some(from), Some(to)) => format!(" {} -> {}", from, to),
        (None, Some(to)) => format!(" to {}", to),
        _ => String::new(),
    };
    format!(
        "Last run{}{} {} ({}, took {})",
        if run.dry_run { " (dry run)" } else { "" },
        versions,
        status,
        format_relative_time(run.timestamp),
        format_duration(std::time::Duration::from_millis(run.duration_ms))
    )
}

fn show_state(ui: &mut dyn UserInterface, state: &ProjectState) {
    if state.tasks.is_empty() && state.runs.is_empty() {
        ui.message("No upgrade recorded for this project. Run 'leapfrog upgrade' to start.");
        return;
    }

    if !state.tasks.is_empty() {
        ui.show_table(&display::step_table(&state.tasks));
    }

    if let Some(run) = state.last_run() {
        ui.message("");
        match run.status {
            RunStatus::Success => ui.success(&describe_run(run)),
            RunStatus::Partial => ui.warning(&describe_run(run)),
            RunStatus::Failed => ui.error(&describe_run(run)),
        }
        if let (Some(error), Some(classification)) = (&run.error, run.classification) {
            ui.message(&format!("  {}: {}", classification, error));
        }
        if run.rolled_back {
            ui.message("  Project was restored from its snapshot");
        }
    }

    if let Some(snapshot) = state.snapshots.get(INITIAL) {
        ui.detail(&format!("Snapshot: {}", snapshot));
    }
}

impl Command for StatusCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        self.target.load_config(ui)?;

        let project_id = ProjectId::from_path(&self.target.root)?;
        let store = StateStore::open(&project_id)?;

        ui.show_header(&format!("{} - Status", project_id.name()));
        show_state(ui, &store.state());

        Ok(CommandResult::success())
    }
}
