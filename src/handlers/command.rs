//! Shell-command handlers.
//!
//! Build, test and code-fix steps run a configured command in the project
//! root. The command is retried up to its attempt budget; when every
//! attempt fails the step fails with the classification of its kind.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::HandlerConfig;
use crate::error::{ClassifiedError, ErrorClassification};
use crate::plan::MigrationContext;
use crate::runner::StepHandler;
use crate::shell::{execute, CommandOptions, CommandResult};

use super::parse_payload;

/// Environment variable carrying the version a command step upgrades to.
pub const TARGET_VERSION_ENV: &str = "LEAPFROG_TARGET_VERSION";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CommandPayload {
    target_version: Option<String>,
}

/// Captured-output options for a step command in the project root.
///
/// The step's target version, when known, is exported as
/// [`TARGET_VERSION_ENV`].
pub fn step_options(context: &MigrationContext, target_version: Option<&str>) -> CommandOptions {
    let options = CommandOptions::captured(Some(context.project_root()));
    match target_version.or(context.target_version.as_deref()) {
        Some(version) => options.with_env(TARGET_VERSION_ENV, version),
        None => options,
    }
}

/// Classification of a command failure, by handler key.
pub fn failure_classification(key: &str) -> ErrorClassification {
    match key {
        "build" => ErrorClassification::CompilerIncompatibility,
        "test" => ErrorClassification::TestFailure,
        "runtime" => ErrorClassification::RuntimeHydration,
        "router" => ErrorClassification::RoutingConfig,
        "ui" => ErrorClassification::PresentationLayer,
        "install" => ErrorClassification::DependencyResolution,
        _ => ErrorClassification::UnclassifiedRuntimeChange,
    }
}

/// Run `command` until it succeeds or `attempts` runs fail.
///
/// Failures are recoverable [`ClassifiedError`]s carrying the last line
/// of output.
pub fn run_with_retries(
    key: &str,
    command: &str,
    attempts: u32,
    options: &CommandOptions,
) -> Result<CommandResult, ClassifiedError> {
    let attempts = attempts.max(1);
    let classification = failure_classification(key);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        info!("Running {} command (attempt {}/{}): {}", key, attempt, attempts, command);
        match execute(command, options) {
            Ok(result) if result.success => return Ok(result),
            Ok(result) => {
                last_error = result
                    .error_summary()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("exit code {:?}", result.exit_code));
            }
            Err(e) => last_error = e.to_string(),
        }
        warn!("{} command failed (attempt {}/{}): {}", key, attempt, attempts, last_error);
    }

    Err(ClassifiedError::new(
        classification,
        true,
        format!(
            "{} failed after {} attempt(s): {}",
            command, attempts, last_error
        ),
    ))
}

/// Runs a configured shell command as a step.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    key: String,
    command: String,
    attempts: u32,
}

impl CommandHandler {
    pub fn new(key: impl Into<String>, command: impl Into<String>, attempts: u32) -> Self {
        Self {
            key: key.into(),
            command: command.into(),
            attempts,
        }
    }

    /// Build from a handler config. Returns `None` if no command is set.
    pub fn from_config(key: &str, config: &HandlerConfig) -> Option<Self> {
        config
            .command
            .as_ref()
            .map(|command| Self::new(key, command.clone(), config.attempts))
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl StepHandler for CommandHandler {
    fn run(&self, context: &MigrationContext, payload: Option<&Value>) -> anyhow::Result<Value> {
        let payload: CommandPayload = parse_payload(payload)?;
        if context.dry_run {
            info!("[dry run] Would run {} command: {}", self.key, self.command);
            return Ok(json!({ "command": self.command, "dryRun": true }));
        }

        let options = step_options(context, payload.target_version.as_deref());
        let result = run_with_retries(&self.key, &self.command, self.attempts, &options)?;
        Ok(json!({
            "command": self.command,
            "durationMs": result.duration.as_millis() as u64,
        }))
    }
}
