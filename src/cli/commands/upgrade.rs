//! Upgrade command implementation.
//!
//! The `leapfrog upgrade` command plans the upgrade path, snapshots the
//! project and runs every step through the orchestrator.

use std::rc::Rc;

use crate::cli::args::UpgradeArgs;
use crate::config::LeapfrogConfig;
use crate::error::{LeapfrogError, Result};
use crate::handlers::build_registry;
use crate::orchestrator::Orchestrator;
use crate::plan::{MigrationContext, Step, StepStatus, UpgradePlanner};
use crate::runner::EngineEvent;
use crate::snapshot::GitSnapshotProvider;
use crate::state::{ProjectId, StateStore};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, ProjectTarget};
use super::display;

/// The upgrade command implementation.
pub struct UpgradeCommand {
    target: ProjectTarget,
    args: UpgradeArgs,
}

impl UpgradeCommand {
    /// Create a new upgrade command.
    pub fn new(target: ProjectTarget, args: UpgradeArgs) -> Self {
        Self { target, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &UpgradeArgs {
        &self.args
    }

    /// Build the run context from flags, falling back to config.
    pub fn context(&self, config: &LeapfrogConfig) -> MigrationContext {
        let mut context = MigrationContext::new(&self.target.root)
            .with_dry_run(self.args.dry_run || config.settings.dry_run)
            .with_strict(self.args.strict || config.settings.strict);

        let current = self.args.from.as_ref().or(config.project.current_version.as_ref());
        if let Some(current) = current {
            context = context.with_current_version(current.clone());
        }
        let target = self.args.target.as_ref().or(config.project.target_version.as_ref());
        if let Some(target) = target {
            context = context.with_target_version(target.clone());
        }
        context
    }

    fn snapshots_enabled(&self, config: &LeapfrogConfig) -> bool {
        !self.args.no_snapshot && config.settings.snapshot
    }
}

impl Command for UpgradeCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.target.load_config(ui)?;
        let context = self.context(&config);

        let project_id = ProjectId::from_path(&self.target.root)?;
        let store = Rc::new(StateStore::open(&project_id)?);
        let registry = build_registry(&config, &self.target.root, store.clone())?;
        let planner =
            UpgradePlanner::new(config.upgrade_path.clone()).with_available(registry.kinds());

        let git = GitSnapshotProvider::new();
        let mut orchestrator = Orchestrator::new(&planner, &registry, &*store);
        if self.snapshots_enabled(&config) {
            orchestrator = orchestrator.with_snapshots(&git);
        } else if !context.dry_run {
            ui.warning("Snapshots disabled: a failed upgrade will not be rolled back");
        }

        let title = match (&context.target_version, self.args.resume) {
            (_, true) => format!("Resuming upgrade of {}", project_id.name()),
            (Some(target), false) => format!("Upgrading {} to {}", project_id.name(), target),
            (None, false) => format!("Upgrading {}", project_id.name()),
        };
        ui.show_header(&title);
        if context.dry_run {
            ui.message("Dry run: no files will be changed and no commands run");
        }

        let mut steps: Vec<Step> = Vec::new();
        let on_event = |event: EngineEvent<'_>| {
            display::show_event(&mut *ui, &event);
            if let EngineEvent::StepStarting { state, .. } | EngineEvent::StepFinished { state, .. } =
                &event
            {
                steps = state.steps().to_vec();
            }
        };
        let result = if self.args.resume {
            orchestrator.resume_with_progress(&context, on_event)
        } else {
            orchestrator.run_with_progress(&context, on_event)
        };

        match result {
            Ok(outcome) => {
                ui.message("");
                ui.show_table(&display::step_table(outcome.state.steps()));
                if let Some(id) = &outcome.snapshot_id {
                    ui.detail(&format!("Snapshot: {}", id));
                }

                if outcome.is_partial_success() {
                    for (failed, blocked) in display::blocked_steps(outcome.state.steps()) {
                        ui.warning(&format!("{} blocked: {}", failed, blocked.join(", ")));
                    }
                    ui.warning(&format!(
                        "Upgrade finished with {} failed and {} skipped steps",
                        outcome.state.count(StepStatus::Failed),
                        outcome.state.count(StepStatus::Skipped)
                    ));
                } else {
                    ui.success("Upgrade complete");
                }
                Ok(CommandResult::success())
            }
            Err(LeapfrogError::MigrationFailed {
                message,
                classification,
            }) => {
                if !steps.is_empty() {
                    ui.message("");
                    ui.show_table(&display::step_table(&steps));
                }
                ui.error(&format!("Upgrade failed ({}): {}", classification, message));
                for (failed, blocked) in display::blocked_steps(&steps) {
                    ui.warning(&format!(
                        "{} blocks {} step(s): {}",
                        failed,
                        blocked.len(),
                        blocked.join(", ")
                    ));
                }

                let rolled_back = store.state().last_run().is_some_and(|r| r.rolled_back);
                if rolled_back {
                    ui.message("Project restored from the pre-upgrade snapshot");
                } else if self.snapshots_enabled(&config) && !context.dry_run {
                    ui.warning("Rollback did not complete; check the project state");
                }
                ui.message("Fix the problem and run 'leapfrog upgrade --resume' to continue");
                Ok(CommandResult::failure(1))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: UpgradeArgs) -> UpgradeCommand {
        UpgradeCommand::new(ProjectTarget::new("/work/shop"), args)
    }

    #[test]
    fn flags_override_config_versions() {
        let mut config = LeapfrogConfig::default();
        config.project.current_version = Some("14.2.0".to_string());
        config.project.target_version = Some("16.0.0".to_string());

        let cmd = command(UpgradeArgs {
            target: Some("17.0.0".to_string()),
            ..Default::default()
        });
        let context = cmd.context(&config);

        assert_eq!(context.current_version.as_deref(), Some("14.2.0"));
        assert_eq!(context.target_version.as_deref(), Some("17.0.0"));
    }

    #[test]
    fn dry_run_and_strict_come_from_either_source() {
        let mut config = LeapfrogConfig::default();
        config.settings.strict = true;

        let context = command(UpgradeArgs {
            dry_run: true,
            ..Default::default()
        })
        .context(&config);

        assert!(context.dry_run);
        assert!(context.strict);
    }

    #[test]
    fn snapshot_needs_config_and_flag() {
        let mut config = LeapfrogConfig::default();
        assert!(command(UpgradeArgs::default()).snapshots_enabled(&config));

        let no_snapshot = command(UpgradeArgs {
            no_snapshot: true,
            ..Default::default()
        });
        assert!(!no_snapshot.snapshots_enabled(&config));

        config.settings.snapshot = false;
        assert!(!command(UpgradeArgs::default()).snapshots_enabled(&config));
    }
}
