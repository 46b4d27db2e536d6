//! Configuration schema definitions.
//!
//! These types mirror the YAML layout of `.leapfrog/config.yml`. Every
//! section is optional; missing keys fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::plan::UpgradeHop;

/// Handler keys that accept a `handlers:` entry.
pub const HANDLER_KEYS: [&str; 6] = ["build", "test", "install", "runtime", "router", "ui"];

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeapfrogConfig {
    /// Versions of the project being migrated.
    pub project: ProjectConfig,

    /// Run settings.
    pub settings: Settings,

    /// Where package metadata comes from.
    pub resolver: ResolverConfig,

    /// Known versions and what each one requires.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upgrade_path: Vec<UpgradeHop>,

    /// Commands for the command-backed handlers, keyed by handler kind.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub handlers: BTreeMap<String, HandlerConfig>,
}

impl LeapfrogConfig {
    /// Command for a handler key, falling back to the built-in default.
    ///
    /// Returns `None` for keys with no configured command and no default
    /// (`runtime`, `router`, `ui`).
    pub fn handler(&self, key: &str) -> Option<HandlerConfig> {
        let configured = self.handlers.get(key);
        let command = configured
            .and_then(|h| h.command.clone())
            .or_else(|| default_command(key).map(str::to_string))?;

        Some(HandlerConfig {
            command: Some(command),
            attempts: configured.map_or_else(default_attempts, |h| h.attempts),
        })
    }
}

fn default_command(key: &str) -> Option<&'static str> {
    match key {
        "build" => Some("npm run build"),
        "test" => Some("npm test"),
        "install" => Some("npm install"),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,
}

/// Run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Report changes without mutating the project.
    #[serde(default, skip_serializing_if = "is_false")]
    pub dry_run: bool,

    /// Take a snapshot before running and roll back on failure.
    #[serde(default = "default_true")]
    pub snapshot: bool,

    /// Fail the dependency step on unresolved conflicts.
    #[serde(default, skip_serializing_if = "is_false")]
    pub strict: bool,

    /// Default output mode: verbose, normal, quiet, silent
    #[serde(default)]
    pub output: OutputMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dry_run: false,
            snapshot: true,
            strict: false,
            output: OutputMode::default(),
        }
    }
}

/// Output verbosity mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Verbose,
    #[default]
    Normal,
    Quiet,
    Silent,
}

/// Package metadata source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub provider: ProviderKind,

    /// Catalog file for the `catalog` provider, relative to the project root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    /// Registry URL passed to `npm view`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Query the npm registry through the `npm` CLI.
    #[default]
    Npm,
    /// Read published versions from a local catalog file.
    Catalog,
}

/// A command-backed handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Shell command, run in the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Times to run the command before giving up.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn is_false(v: &bool) -> bool {
    !v
}
