//! Plan command implementation.
//!
//! The `leapfrog plan` command prints the steps an upgrade would run and
//! checks them the way the engine would: every handler must be
//! registered, every dependency must name a planned step and the
//! dependency graph must be acyclic.

use std::rc::Rc;

use crate::cli::args::{PlanArgs, UpgradeArgs};
use crate::error::Result;
use crate::handlers::build_registry;
use crate::plan::{Planner, Step, UpgradePlanner};
use crate::runner::{AgentRegistry, TaskGraph};
use crate::state::MemoryStore;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, ProjectTarget};
use super::display;
use super::upgrade::UpgradeCommand;

/// The plan command implementation.
pub struct PlanCommand {
    target: ProjectTarget,
    args: PlanArgs,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(target: ProjectTarget, args: PlanArgs) -> Self {
        Self { target, args }
    }
}

/// Problems that would stop a planned step list from running.
pub fn check_plan(steps: &[Step], registry: &AgentRegistry) -> Vec<String> {
    let mut problems = Vec::new();

    for step in steps {
        if let Err(e) = registry.resolve(&step.handler_name) {
            problems.push(format!("{}: {}", step.id, e));
        }
    }

    match TaskGraph::from_steps(steps.iter().cloned()) {
        Ok(graph) => {
            for (step, dep) in graph.unknown_dependencies() {
                problems.push(format!("{}: depends on unknown step '{}'", step, dep));
            }
            if let Err(e) = graph.check_acyclic() {
                problems.push(e.to_string());
            }
        }
        Err(e) => problems.push(e.to_string()),
    }

    problems
}

impl Command for PlanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.target.load_config(ui)?;
        let context = UpgradeCommand::new(
            self.target.clone(),
            UpgradeArgs {
                target: self.args.target.clone(),
                from: self.args.from.clone(),
                dry_run: true,
                ..Default::default()
            },
        )
        .context(&config);

        let registry = build_registry(&config, &self.target.root, Rc::new(MemoryStore::new()))?;
        let planner =
            UpgradePlanner::new(config.upgrade_path.clone()).with_available(registry.kinds());

        let steps = match planner.plan(&context) {
            Ok(steps) => steps,
            Err(e) => {
                ui.error(&format!("Planning failed: {:#}", e));
                return Ok(CommandResult::failure(1));
            }
        };

        ui.show_header(&format!(
            "Upgrade plan: {} -> {}",
            context.current_version.as_deref().unwrap_or("?"),
            context
                .target_version
                .as_deref()
                .or(config.upgrade_path.last().map(|h| h.version.as_str()))
                .unwrap_or("?")
        ));
        ui.show_table(&display::step_table(&steps));

        let problems = check_plan(&steps, &registry);
        if problems.is_empty() {
            ui.success(&format!("{} steps planned", steps.len()));
            Ok(CommandResult::success())
        } else {
            for problem in &problems {
                ui.error(problem);
            }
            Ok(CommandResult::failure(1))
        }
    }
}
