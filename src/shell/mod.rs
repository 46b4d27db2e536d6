//! Shell command execution.
//!
//! Package managers, version control and build tools are reached only
//! through this module.

pub mod command;
pub mod platform;

pub use command::{execute, execute_check, execute_program, CommandOptions, CommandResult};
pub use platform::is_ci;
