//! Shared display helpers for step lists and run progress.
//!
//! These helpers are used by `upgrade`, `plan` and `status` to render
//! [`Step`] lists and engine events consistently.

use crate::plan::{Step, StepStatus};
use crate::runner::{EngineEvent, TaskGraph};
use crate::ui::{status_symbol, Table, UserInterface};

/// Table of steps with their handler, dependencies and status.
pub fn step_table(steps: &[Step]) -> Table {
    let mut table = Table::new(&["", "Step", "Handler", "Depends on", "Status"]);
    for step in steps {
        table.add_row(&[
            status_symbol(step.status).to_string(),
            step.id.clone(),
            step.handler_name.clone(),
            step.dependency_ids.join(", "),
            step.status.to_string(),
        ]);
    }
    table
}

/// Non-terminal steps that each failed step keeps from running.
pub fn blocked_steps(steps: &[Step]) -> Vec<(String, Vec<String>)> {
    let Ok(graph) = TaskGraph::from_steps(steps.iter().cloned()) else {
        return Vec::new();
    };

    steps
        .iter()
        .filter(|s| s.status == StepStatus::Failed)
        .filter_map(|failed| {
            let blocked: Vec<String> = graph
                .transitive_dependents(&failed.id)
                .into_iter()
                .filter(|id| graph.get(id).is_some_and(|s| !s.status.is_terminal()))
                .collect();
            (!blocked.is_empty()).then(|| (failed.id.clone(), blocked))
        })
        .collect()
}

/// Report one engine event.
pub fn show_event(ui: &mut dyn UserInterface, event: &EngineEvent<'_>) {
    match event {
        EngineEvent::PhaseChanged { from, to } => ui.detail(&format!("{} -> {}", from, to)),
        EngineEvent::StepStarting {
            step, index, total, ..
        } => ui.show_progress(index + 1, *total, &step.description),
        EngineEvent::StepFinished { step, state } => match step.status {
            StepStatus::Completed => ui.success(&step.description),
            _ => {
                let reason = state
                    .last_error()
                    .filter(|e| e.step_id == step.id)
                    .map(|e| format!(" ({}): {}", e.classification, e.message))
                    .unwrap_or_default();
                ui.error(&format!("{}{}", step.description, reason));
            }
        },
        EngineEvent::StepSkipped { step } => {
            ui.skipped(&format!("{} (blocked by a failed step)", step.description))
        }
    }
}
