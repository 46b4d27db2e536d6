//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::config::{load_config, validate, LeapfrogConfig};
use crate::error::Result;
use crate::ui::{OutputMode, UserInterface};

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command, writing user-facing output to `ui`.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Project location shared by every command.
#[derive(Debug, Clone)]
pub struct ProjectTarget {
    /// Project root directory.
    pub root: PathBuf,
    /// `--config` override, loaded alone instead of the merged layers.
    pub config: Option<PathBuf>,
}

impl ProjectTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: None,
        }
    }

    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    /// Load and validate the project config.
    ///
    /// When no output flag was given, the config's `settings.output` takes
    /// over the UI mode.
    pub fn load_config(&self, ui: &mut dyn UserInterface) -> Result<LeapfrogConfig> {
        let config = load_config(&self.root, self.config.as_deref())?;
        validate(&config)?;

        if ui.output_mode() == OutputMode::Normal {
            ui.set_output_mode(config.settings.output.into());
        }
        Ok(config)
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    target: ProjectTarget,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            target: ProjectTarget::new(project_root),
        }
    }

    /// Load config from this file only.
    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.target = self.target.with_config(config);
        self
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.target.root
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        match &cli.command {
            Commands::Upgrade(args) => {
                super::upgrade::UpgradeCommand::new(self.target.clone(), args.clone()).execute(ui)
            }
            Commands::Plan(args) => {
                super::plan::PlanCommand::new(self.target.clone(), args.clone()).execute(ui)
            }
            Commands::Resolve(args) => {
                super::resolve::ResolveCommand::new(self.target.clone(), args.clone()).execute(ui)
            }
            Commands::Status => super::status::StatusCommand::new(self.target.clone()).execute(ui),
        }
    }
}
