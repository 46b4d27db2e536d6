//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`leapfrog upgrade`, `leapfrog status`)
//! - Shared config loading through [`ProjectTarget`]
//! - Consistent global flag handling

pub mod dispatcher;
pub mod display;
pub mod plan;
pub mod resolve;
pub mod status;
pub mod upgrade;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, ProjectTarget};
