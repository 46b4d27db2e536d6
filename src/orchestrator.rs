//! Top-level migration sequencing.
//!
//! An [`Orchestrator`] snapshots the project, drives a [`WorkflowEngine`]
//! to a terminal phase and, when the run ends FAILED, restores the
//! snapshot before surfacing the error. The step list is persisted through
//! the [`MigrationStore`] on every step transition so a run can be
//! inspected or resumed after the process exits.

use tracing::{debug, info, warn};

use crate::error::{ErrorClassification, LeapfrogError, Result};
use crate::plan::{MigrationContext, Planner, Step};
use crate::runner::{AgentRegistry, EngineEvent, Phase, WorkflowEngine, WorkflowState};
use crate::snapshot::{SnapshotController, SnapshotProvider};
use crate::state::{MigrationStore, RunHistoryBuilder};

/// Result of a run that reached COMPLETED.
#[derive(Debug)]
pub struct MigrationOutcome {
    /// Final workflow state.
    pub state: WorkflowState,
    /// Snapshot taken (or reused) for this run.
    pub snapshot_id: Option<String>,
}

impl MigrationOutcome {
    /// Whether some steps did not complete.
    pub fn is_partial_success(&self) -> bool {
        self.state.is_partial_success()
    }
}

/// Sequences snapshot, engine run and rollback.
pub struct Orchestrator<'a> {
    planner: &'a dyn Planner,
    registry: &'a AgentRegistry,
    store: &'a dyn MigrationStore,
    snapshots: Option<&'a dyn SnapshotProvider>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        planner: &'a dyn Planner,
        registry: &'a AgentRegistry,
        store: &'a dyn MigrationStore,
    ) -> Self {
        Self {
            planner,
            registry,
            store,
            snapshots: None,
        }
    }

    /// Enable snapshots and rollback through `provider`.
    pub fn with_snapshots(mut self, provider: &'a dyn SnapshotProvider) -> Self {
        self.snapshots = Some(provider);
        self
    }

    /// Run a migration to a terminal phase.
    pub fn run(&self, context: &MigrationContext) -> Result<MigrationOutcome> {
        self.run_with_progress(context, |_| {})
    }

    /// Run a migration, forwarding engine events to `on_event`.
    ///
    /// # Errors
    ///
    /// Returns [`LeapfrogError::MigrationFailed`] when the run ends FAILED.
    /// The snapshot has been restored (or the restore attempt logged) by
    /// then.
    pub fn run_with_progress(
        &self,
        context: &MigrationContext,
        mut on_event: impl FnMut(EngineEvent<'_>),
    ) -> Result<MigrationOutcome> {
        let controller = self.controller(context);
        let snapshot_id = controller
            .as_ref()
            .and_then(|c| c.create(context.project_root()));

        let history = RunHistoryBuilder::start(context);
        let engine = WorkflowEngine::new(self.planner, self.registry);
        let state = engine.run_with_progress(context, |event| {
            self.persist(&event);
            on_event(event);
        });

        self.finish(context, state, controller, snapshot_id, history)
    }

    /// Continue the run recorded in the store.
    ///
    /// Planning is skipped and no new snapshot is taken: the persisted
    /// `initial` snapshot, if any, is the rollback target.
    pub fn resume_with_progress(
        &self,
        context: &MigrationContext,
        mut on_event: impl FnMut(EngineEvent<'_>),
    ) -> Result<MigrationOutcome> {
        let steps = self.store.all_tasks()?;
        if steps.is_empty() {
            return Err(LeapfrogError::ConfigValidationError {
                message: "no recorded run to resume".to_string(),
            });
        }
        info!("Resuming run with {} recorded steps", steps.len());

        let controller = self.controller(context);
        let snapshot_id = controller.as_ref().and_then(|c| c.persisted());
        if controller.is_some() && snapshot_id.is_none() {
            warn!("No snapshot recorded for this run; rollback is unavailable");
        }

        let history = RunHistoryBuilder::start(context);
        let engine = WorkflowEngine::new(self.planner, self.registry);
        let state = engine.resume_with_progress(steps, context, |event| {
            self.persist(&event);
            on_event(event);
        });

        self.finish(context, state, controller, snapshot_id, history)
    }

    fn controller(&self, context: &MigrationContext) -> Option<SnapshotController<'a>> {
        if context.dry_run {
            debug!("Dry run: snapshots disabled");
            return None;
        }
        self.snapshots
            .map(|provider| SnapshotController::new(provider, self.store))
    }

    fn persist(&self, event: &EngineEvent<'_>) {
        let steps = match event {
            EngineEvent::StepStarting { state, .. } | EngineEvent::StepFinished { state, .. } => {
                state.steps()
            }
            _ => return,
        };
        self.save(steps);
    }

    fn save(&self, steps: &[Step]) {
        if let Err(e) = self.store.save_tasks(steps) {
            warn!("Could not persist step list: {}", e);
        }
    }

    fn finish(
        &self,
        context: &MigrationContext,
        state: WorkflowState,
        controller: Option<SnapshotController<'_>>,
        snapshot_id: Option<String>,
        mut history: RunHistoryBuilder,
    ) -> Result<MigrationOutcome> {
        self.save(state.steps());

        if state.phase() != Phase::Failed {
            if let Err(e) = self.store.record_run(history.finish(&state)) {
                warn!("Could not record run history: {}", e);
            }
            return Ok(MigrationOutcome { state, snapshot_id });
        }

        let rolled_back = match (&controller, &snapshot_id) {
            (Some(controller), Some(id)) => controller.restore(context.project_root(), id),
            _ => {
                warn!("No snapshot available; skipping rollback");
                false
            }
        };
        history.rolled_back(rolled_back);
        if let Err(e) = self.store.record_run(history.finish(&state)) {
            warn!("Could not record run history: {}", e);
        }

        let (message, classification) = state.last_error().map_or_else(
            || {
                (
                    "migration failed".to_string(),
                    ErrorClassification::UnclassifiedRuntimeChange,
                )
            },
            |e| (e.message.clone(), e.classification),
        );
        Err(LeapfrogError::MigrationFailed {
            message,
            classification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifiedError;
    use crate::plan::{StaticPlan, StepStatus};
    use crate::runner::HandlerKind;
    use crate::snapshot::INITIAL;
    use crate::state::{MemoryStore, RunStatus};
    use serde_json::Value;
    use std::cell::RefCell;
    use std::path::Path;

    #[derive(Default)]
    struct RecordingSnapshots {
        created: RefCell<u32>,
        restored: RefCell<Vec<String>>,
        fail_create: bool,
        fail_restore: bool,
    }

    impl SnapshotProvider for RecordingSnapshots {
        fn create(&self, _: &Path, label: &str) -> Result<String> {
            if self.fail_create {
                return Err(LeapfrogError::SnapshotFailed {
                    message: "not a repository".into(),
                });
            }
            *self.created.borrow_mut() += 1;
            Ok(format!("snap-{}-{}", label, self.created.borrow()))
        }

        fn restore(&self, _: &Path, snapshot_id: &str) -> Result<()> {
            self.restored.borrow_mut().push(snapshot_id.to_string());
            if self.fail_restore {
                return Err(LeapfrogError::SnapshotFailed {
                    message: "reset failed".into(),
                });
            }
            Ok(())
        }
    }

    fn pass(_: &MigrationContext, _: Option<&Value>) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    fn fatal(_: &MigrationContext, _: Option<&Value>) -> anyhow::Result<Value> {
        Err(ClassifiedError::toolchain("node 14 is not supported").into())
    }

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry.register(HandlerKind::Environment, pass);
        registry.register(HandlerKind::Build, pass);
        registry.register(HandlerKind::Test, fatal);
        registry
    }

    fn steps() -> Vec<Step> {
        vec![
            Step::new("env", "ENVIRONMENT_CHECK", "env", "EnvironmentAgent"),
            Step::new("build", "BUILD_FIX", "build", "BuildAgent").depends_on(["env"]),
        ]
    }

    #[test]
    fn completed_run_keeps_snapshot_and_records_history() {
        let registry = registry();
        let planner = StaticPlan::new(steps());
        let store = MemoryStore::new();
        let snapshots = RecordingSnapshots::default();

        let outcome = Orchestrator::new(&planner, &registry, &store)
            .with_snapshots(&snapshots)
            .run(&MigrationContext::new("."))
            .unwrap();

        assert_eq!(outcome.state.phase(), Phase::Completed);
        assert_eq!(outcome.snapshot_id.as_deref(), Some("snap-pre-upgrade-1"));
        assert!(snapshots.restored.borrow().is_empty());
        assert_eq!(
            store.snapshot(INITIAL).unwrap().as_deref(),
            Some("snap-pre-upgrade-1")
        );

        let tasks = store.all_tasks().unwrap();
        assert!(tasks.iter().all(|s| s.status == StepStatus::Completed));
        assert_eq!(store.runs()[0].status, RunStatus::Success);
    }

    #[test]
    fn failed_run_restores_exact_snapshot_and_returns_original_error() {
        let registry = registry();
        let planner = StaticPlan::new(vec![
            Step::new("env", "ENVIRONMENT_CHECK", "env", "EnvironmentAgent"),
            Step::new("test", "TEST", "test", "TestAgent").depends_on(["env"]),
        ]);
        let store = MemoryStore::new();
        let snapshots = RecordingSnapshots::default();

        let err = Orchestrator::new(&planner, &registry, &store)
            .with_snapshots(&snapshots)
            .run(&MigrationContext::new("."))
            .unwrap_err();

        assert_eq!(*snapshots.restored.borrow(), vec!["snap-pre-upgrade-1"]);
        match err {
            LeapfrogError::MigrationFailed {
                message,
                classification,
            } => {
                assert!(message.contains("node 14"));
                assert_eq!(classification, ErrorClassification::ToolchainIncompatibility);
            }
            other => panic!("unexpected error: {other}"),
        }

        let tasks = store.all_tasks().unwrap();
        assert_eq!(tasks[1].status, StepStatus::Failed);
        let run = &store.runs()[0];
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.rolled_back);
    }

    #[test]
    fn restore_failure_does_not_mask_original_error() {
        let registry = registry();
        let planner = StaticPlan::new(vec![Step::new("test", "TEST", "test", "TestAgent")]);
        let store = MemoryStore::new();
        let snapshots = RecordingSnapshots {
            fail_restore: true,
            ..Default::default()
        };

        let err = Orchestrator::new(&planner, &registry, &store)
            .with_snapshots(&snapshots)
            .run(&MigrationContext::new("."))
            .unwrap_err();

        assert!(matches!(err, LeapfrogError::MigrationFailed { .. }));
        assert!(err.to_string().contains("node 14"));
        assert!(!store.runs()[0].rolled_back);
    }

    #[test]
    fn snapshot_failure_is_not_fatal() {
        let registry = registry();
        let planner = StaticPlan::new(steps());
        let store = MemoryStore::new();
        let snapshots = RecordingSnapshots {
            fail_create: true,
            ..Default::default()
        };

        let outcome = Orchestrator::new(&planner, &registry, &store)
            .with_snapshots(&snapshots)
            .run(&MigrationContext::new("."))
            .unwrap();

        assert_eq!(outcome.state.phase(), Phase::Completed);
        assert!(outcome.snapshot_id.is_none());
    }

    #[test]
    fn dry_run_takes_no_snapshot() {
        let registry = registry();
        let planner = StaticPlan::new(steps());
        let store = MemoryStore::new();
        let snapshots = RecordingSnapshots::default();

        Orchestrator::new(&planner, &registry, &store)
            .with_snapshots(&snapshots)
            .run(&MigrationContext::new(".").with_dry_run(true))
            .unwrap();

        assert_eq!(*snapshots.created.borrow(), 0);
    }

    #[test]
    fn step_list_is_persisted_while_running() {
        let registry = registry();
        let planner = StaticPlan::new(steps());
        let store = MemoryStore::new();

        let mut seen_in_progress = Vec::new();
        Orchestrator::new(&planner, &registry, &store)
            .run_with_progress(&MigrationContext::new("."), |event| {
                if let EngineEvent::StepStarting { step, .. } = event {
                    let saved = store.all_tasks().unwrap();
                    let status = saved.iter().find(|s| s.id == step.id).map(|s| s.status);
                    seen_in_progress.push(status);
                }
            })
            .unwrap();

        assert_eq!(
            seen_in_progress,
            vec![Some(StepStatus::InProgress), Some(StepStatus::InProgress)]
        );
    }

    #[test]
    fn resume_continues_recorded_steps_with_persisted_snapshot() {
        let registry = registry();
        let planner = StaticPlan::new(vec![]);
        let store = MemoryStore::new();
        let mut recorded = steps();
        recorded[0].status = StepStatus::Completed;
        recorded[1].status = StepStatus::InProgress;
        store.save_tasks(&recorded).unwrap();
        store.save_snapshot(INITIAL, "snap-earlier").unwrap();
        let snapshots = RecordingSnapshots::default();

        let outcome = Orchestrator::new(&planner, &registry, &store)
            .with_snapshots(&snapshots)
            .resume_with_progress(&MigrationContext::new("."), |_| {})
            .unwrap();

        assert_eq!(outcome.snapshot_id.as_deref(), Some("snap-earlier"));
        assert_eq!(*snapshots.created.borrow(), 0);
        assert!(store
            .all_tasks()
            .unwrap()
            .iter()
            .all(|s| s.status == StepStatus::Completed));
    }

    #[test]
    fn resume_without_recorded_run_fails() {
        let registry = registry();
        let planner = StaticPlan::new(vec![]);
        let store = MemoryStore::new();

        let err = Orchestrator::new(&planner, &registry, &store)
            .resume_with_progress(&MigrationContext::new("."), |_| {})
            .unwrap_err();
        assert!(err.to_string().contains("no recorded run"));
    }
}
