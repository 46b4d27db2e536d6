//! Leapfrog - dependency-ordered framework upgrades with rollback.
//!
//! Leapfrog plans a major-version upgrade as a graph of steps, runs the
//! steps one at a time through registered handlers, and restores the
//! project from a snapshot when the run fails.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, merging, and validation
//! - [`error`] - Error types, result alias, and failure classification
//! - [`handlers`] - Built-in step handlers
//! - [`orchestrator`] - Snapshot, run, and rollback sequencing
//! - [`plan`] - Steps, run context, and planners
//! - [`resolver`] - Package dependency resolution and conflict detection
//! - [`runner`] - Task graph, handler registry, and the workflow engine
//! - [`shell`] - Shell command execution
//! - [`snapshot`] - Restore points
//! - [`state`] - Persisted steps, snapshots, and run history
//! - [`ui`] - Terminal output
//!
//! # Example
//!
//! ```
//! use leapfrog::plan::{MigrationContext, StaticPlan, Step};
//! use leapfrog::runner::{AgentRegistry, HandlerKind, Phase, WorkflowEngine};
//! use serde_json::{json, Value};
//!
//! fn build(_: &MigrationContext, _: Option<&Value>) -> anyhow::Result<Value> {
//!     Ok(json!({ "built": true }))
//! }
//!
//! let mut registry = AgentRegistry::new();
//! registry.register(HandlerKind::Build, build);
//!
//! let plan = StaticPlan::new(vec![Step::new("build", "BUILD", "Build", "BuildAgent")]);
//! let state = WorkflowEngine::new(&plan, &registry).run(&MigrationContext::new("."));
//!
//! assert_eq!(state.phase(), Phase::Completed);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod plan;
pub mod resolver;
pub mod runner;
pub mod shell;
pub mod snapshot;
pub mod state;
pub mod ui;

pub use error::{LeapfrogError, Result};
