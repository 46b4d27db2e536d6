//! Workflow execution state machine.
//!
//! The engine drives a run through `PLANNING → EXECUTION → {COMPLETED |
//! FAILED}`. Each EXECUTION iteration picks one step, runs its handler to
//! completion and records the outcome; no two steps run concurrently.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{classify, ErrorClassification};
use crate::plan::{MigrationContext, Planner, Step, StepStatus};

use super::graph::TaskGraph;
use super::registry::AgentRegistry;

/// High-level phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Planning,
    Execution,
    Verification,
    Rollback,
    Completed,
    Failed,
}

impl Phase {
    /// Whether the run is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Planning => "PLANNING",
            Self::Execution => "EXECUTION",
            Self::Verification => "VERIFICATION",
            Self::Rollback => "ROLLBACK",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// The most recent step failure of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    /// Step that failed.
    pub step_id: String,
    pub message: String,
    pub classification: ErrorClassification,
    pub recoverable: bool,
    /// Failures so far in this run, across all steps.
    pub attempt: u32,
}

/// State of one run. Owned by the engine for the duration of the run.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    graph: TaskGraph,
    current_step_id: Option<String>,
    phase: Phase,
    last_error: Option<LastError>,
    phase_history: Vec<Phase>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    /// Fresh state in the PLANNING phase.
    pub fn new() -> Self {
        Self {
            graph: TaskGraph::new(),
            current_step_id: None,
            phase: Phase::Planning,
            last_error: None,
            phase_history: vec![Phase::Planning],
        }
    }

    /// Steps in list order.
    pub fn steps(&self) -> &[Step] {
        self.graph.steps()
    }

    /// Read-only view of the task graph.
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Get a step by id.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.graph.get(id)
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase the run has entered, in order.
    pub fn phase_history(&self) -> &[Phase] {
        &self.phase_history
    }

    /// Step most recently executed.
    pub fn current_step_id(&self) -> Option<&str> {
        self.current_step_id.as_deref()
    }

    /// Most recent failure.
    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    /// Number of steps with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps().iter().filter(|s| s.status == status).count()
    }

    /// COMPLETED run in which some steps did not complete.
    pub fn is_partial_success(&self) -> bool {
        self.phase == Phase::Completed
            && self.steps().iter().any(|s| s.status != StepStatus::Completed)
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!("Phase {} -> {}", self.phase, phase);
            self.phase = phase;
            self.phase_history.push(phase);
        }
    }

    fn record_failure(
        &mut self,
        step_id: &str,
        message: String,
        classification: ErrorClassification,
        recoverable: bool,
    ) {
        let attempt = self.last_error.as_ref().map_or(0, |e| e.attempt) + 1;
        self.last_error = Some(LastError {
            step_id: step_id.to_string(),
            message,
            classification,
            recoverable,
            attempt,
        });
    }
}

/// Progress events emitted while a run advances.
#[derive(Debug)]
pub enum EngineEvent<'a> {
    /// The run moved to a new phase.
    PhaseChanged { from: Phase, to: Phase },
    /// A step is about to run.
    StepStarting {
        step: &'a Step,
        index: usize,
        total: usize,
        state: &'a WorkflowState,
    },
    /// A step reached COMPLETED or FAILED.
    StepFinished {
        step: &'a Step,
        state: &'a WorkflowState,
    },
    /// A step could never become runnable and was marked SKIPPED.
    StepSkipped { step: &'a Step },
}

/// Drives a run from planning to a terminal phase.
pub struct WorkflowEngine<'a> {
    planner: &'a dyn Planner,
    registry: &'a AgentRegistry,
}

impl<'a> WorkflowEngine<'a> {
    /// Create an engine over a planner and a handler registry.
    pub fn new(planner: &'a dyn Planner, registry: &'a AgentRegistry) -> Self {
        Self { planner, registry }
    }

    /// Run to a terminal phase.
    pub fn run(&self, context: &MigrationContext) -> WorkflowState {
        self.run_with_progress(context, |_| {})
    }

    /// Run to a terminal phase, reporting progress.
    pub fn run_with_progress(
        &self,
        context: &MigrationContext,
        mut on_event: impl FnMut(EngineEvent<'_>),
    ) -> WorkflowState {
        let mut state = WorkflowState::new();
        self.plan(&mut state, context, &mut on_event);
        self.drive(&mut state, context, &mut on_event);
        state
    }

    /// Continue a run from a recorded step list, skipping planning.
    ///
    /// Statuses are kept as recorded, so an interrupted IN_PROGRESS step is
    /// selectable again.
    pub fn resume_with_progress(
        &self,
        steps: Vec<Step>,
        context: &MigrationContext,
        mut on_event: impl FnMut(EngineEvent<'_>),
    ) -> WorkflowState {
        let mut state = WorkflowState::new();
        match TaskGraph::from_steps(steps) {
            Ok(graph) => {
                state.graph = graph;
                transition(&mut state, Phase::Execution, &mut on_event);
            }
            Err(e) => fail_run(&mut state, "", e.to_string(), &mut on_event),
        }
        self.drive(&mut state, context, &mut on_event);
        state
    }

    fn drive(
        &self,
        state: &mut WorkflowState,
        context: &MigrationContext,
        on_event: &mut dyn FnMut(EngineEvent<'_>),
    ) {
        while state.phase == Phase::Execution {
            self.execute_next(state, context, on_event);
        }

        match state.phase {
            Phase::Completed => info!(
                "Run completed: {} completed, {} failed, {} skipped",
                state.count(StepStatus::Completed),
                state.count(StepStatus::Failed),
                state.count(StepStatus::Skipped)
            ),
            _ => error!(
                "Run failed: {}",
                state.last_error.as_ref().map_or("unknown error", |e| e.message.as_str())
            ),
        }
    }

    /// PLANNING: ask the planner for the step list, then enter EXECUTION.
    pub fn plan(
        &self,
        state: &mut WorkflowState,
        context: &MigrationContext,
        on_event: &mut dyn FnMut(EngineEvent<'_>),
    ) {
        info!("Planning migration");

        let steps = match self.planner.plan(context) {
            Ok(steps) => steps,
            Err(e) => {
                fail_run(state, "", format!("planning failed: {:#}", e), on_event);
                return;
            }
        };

        let graph = match TaskGraph::from_steps(steps) {
            Ok(graph) => graph,
            Err(e) => {
                fail_run(state, "", e.to_string(), on_event);
                return;
            }
        };

        for (step, dep) in graph.unknown_dependencies() {
            warn!("Step '{}' depends on unknown step '{}'; it will never run", step, dep);
        }

        info!("Planned {} steps", graph.len());
        state.graph = graph;
        transition(state, Phase::Execution, on_event);
    }

    /// One EXECUTION iteration.
    pub fn execute_next(
        &self,
        state: &mut WorkflowState,
        context: &MigrationContext,
        on_event: &mut dyn FnMut(EngineEvent<'_>),
    ) {
        if state.phase != Phase::Execution {
            return;
        }

        let Some(step) = state.graph.next_selectable().cloned() else {
            skip_blocked(state, on_event);
            state.current_step_id = None;
            transition(state, Phase::Completed, on_event);
            return;
        };

        let total = state.graph.len();
        let index = state
            .steps()
            .iter()
            .position(|s| s.id == step.id)
            .unwrap_or(0);

        state.graph.set_status(&step.id, StepStatus::InProgress);
        state.current_step_id = Some(step.id.clone());
        on_event(EngineEvent::StepStarting {
            step: &step,
            index,
            total,
            state,
        });
        info!("Executing {} ({})", step.id, step.handler_name);

        let outcome = self
            .registry
            .resolve(&step.handler_name)
            .map_err(anyhow::Error::from)
            .and_then(|handler| handler.run(context, step.payload.as_ref()));

        match outcome {
            Ok(_) => {
                state.graph.set_status(&step.id, StepStatus::Completed);
                debug!("Step {} completed", step.id);
            }
            Err(err) => {
                state.graph.set_status(&step.id, StepStatus::Failed);
                let (classification, recoverable) = classify(&err);
                let message = format!("{:#}", err);
                error!("Step {} failed ({}): {}", step.id, classification, message);
                state.record_failure(&step.id, message, classification, recoverable);

                if !recoverable {
                    transition(state, Phase::Failed, on_event);
                }
            }
        }

        if let Some(finished) = state.step(&step.id) {
            on_event(EngineEvent::StepFinished {
                step: finished,
                state,
            });
        }
    }
}

fn transition(
    state: &mut WorkflowState,
    to: Phase,
    on_event: &mut dyn FnMut(EngineEvent<'_>),
) {
    let from = state.phase;
    if from == to {
        return;
    }
    state.enter(to);
    on_event(EngineEvent::PhaseChanged { from, to });
}

fn fail_run(
    state: &mut WorkflowState,
    step_id: &str,
    message: String,
    on_event: &mut dyn FnMut(EngineEvent<'_>),
) {
    error!("{}", message);
    state.record_failure(step_id, message, ErrorClassification::ConfigurationError, false);
    transition(state, Phase::Failed, on_event);
}

/// Mark every step that can no longer run as SKIPPED.
fn skip_blocked(state: &mut WorkflowState, on_event: &mut dyn FnMut(EngineEvent<'_>)) {
    let blocked: Vec<String> = state
        .steps()
        .iter()
        .filter(|s| s.status == StepStatus::Pending)
        .map(|s| s.id.clone())
        .collect();

    for id in blocked {
        warn!("Step {} is blocked by an incomplete dependency; skipping", id);
        state.graph.set_status(&id, StepStatus::Skipped);
        if let Some(step) = state.step(&id) {
            on_event(EngineEvent::StepSkipped { step });
        }
    }
}
