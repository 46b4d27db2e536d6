//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Leapfrog - step-by-step framework upgrades with rollback.
#[derive(Debug, Parser)]
#[command(name = "leapfrog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides .leapfrog/config.yml and its layers)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the upgrade
    Upgrade(UpgradeArgs),

    /// Show the planned steps without running them
    Plan(PlanArgs),

    /// Resolve the dependency tree of a manifest
    Resolve(ResolveArgs),

    /// Show the recorded steps and last run
    Status,
}

/// Arguments for the `upgrade` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct UpgradeArgs {
    /// Version to upgrade to (defaults to config, then the last upgrade path entry)
    #[arg(short, long, value_name = "VERSION")]
    pub target: Option<String>,

    /// Version the project is on (defaults to project.current_version)
    #[arg(long, value_name = "VERSION")]
    pub from: Option<String>,

    /// Log every step without changing files or running commands
    #[arg(long)]
    pub dry_run: bool,

    /// Do not create a snapshot before upgrading
    #[arg(long)]
    pub no_snapshot: bool,

    /// Fail on unresolved dependency conflicts
    #[arg(long)]
    pub strict: bool,

    /// Continue the recorded run instead of planning a new one
    #[arg(long, conflicts_with_all = ["target", "from"])]
    pub resume: bool,
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PlanArgs {
    /// Version to upgrade to
    #[arg(short, long, value_name = "VERSION")]
    pub target: Option<String>,

    /// Version the project is on
    #[arg(long, value_name = "VERSION")]
    pub from: Option<String>,
}

/// Arguments for the `resolve` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ResolveArgs {
    /// Manifest to resolve, relative to the project root
    #[arg(short, long, default_value = "package.json")]
    pub manifest: PathBuf,

    /// Exit with an error when conflicts remain unresolved
    #[arg(long)]
    pub strict: bool,
}

impl Default for ResolveArgs {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("package.json"),
            strict: false,
        }
    }
}
