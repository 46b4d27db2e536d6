//! Console output.
//!
//! This module provides:
//! - [`UserInterface`] trait for output abstraction
//! - [`TerminalUI`], styled output on the terminal
//! - [`MockUI`], which records everything for assertions
//! - [`Table`] and formatting helpers for status displays
//!
//! Leapfrog never prompts: every decision comes from flags or config, so
//! the interface is output-only.
//!
//! # Example
//!
//! ```
//! use leapfrog::ui::{create_ui, OutputMode};
//!
//! let mut ui = create_ui(OutputMode::Quiet);
//! ui.show_header("Upgrade to 17.0.0");
//! ui.success("Upgrade complete");
//! ```

pub mod mock;
pub mod output;
pub mod progress;
pub mod table;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use progress::{format_duration, format_relative_time, status_symbol};
pub use table::Table;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, LeapfrogTheme};

/// Trait for user-facing output.
///
/// Commands write through this trait so tests can capture output with
/// [`MockUI`].
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Change the output mode.
    fn set_output_mode(&mut self, mode: OutputMode);

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message. Shown in every output mode.
    fn error(&mut self, msg: &str);

    /// Display a skipped item.
    fn skipped(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show progress (e.g., "[3/7] Build 16.0.0").
    fn show_progress(&mut self, current: usize, total: usize, label: &str);

    /// Show extra detail, only in verbose mode.
    fn detail(&mut self, msg: &str);

    /// Render a table.
    fn show_table(&mut self, table: &Table);
}
