//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! output for later assertion.
//!
//! # Example
//!
//! ```
//! use leapfrog::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.message("Planning upgrade");
//! ui.success("Done");
//!
//! assert!(ui.has_message("Planning"));
//! assert!(ui.has_success("Done"));
//! ```

use super::{OutputMode, Table, UserInterface};

/// Captures every UI call.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    skips: Vec<String>,
    headers: Vec<String>,
    progress: Vec<(usize, usize, String)>,
    details: Vec<String>,
    tables: Vec<String>,
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn skips(&self) -> &[String] {
        &self.skips
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Progress updates as (current, total, label).
    pub fn progress(&self) -> &[(usize, usize, String)] {
        &self.progress
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// Rendered tables.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn has_message(&self, msg: &str) -> bool {
        self.messages.iter().any(|m| m.contains(msg))
    }

    pub fn has_success(&self, msg: &str) -> bool {
        self.successes.iter().any(|m| m.contains(msg))
    }

    pub fn has_warning(&self, msg: &str) -> bool {
        self.warnings.iter().any(|m| m.contains(msg))
    }

    pub fn has_error(&self, msg: &str) -> bool {
        self.errors.iter().any(|m| m.contains(msg))
    }

    pub fn has_skip(&self, msg: &str) -> bool {
        self.skips.iter().any(|m| m.contains(msg))
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn skipped(&mut self, msg: &str) {
        self.skips.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn show_progress(&mut self, current: usize, total: usize, label: &str) {
        self.progress.push((current, total, label.to_string()));
    }

    fn detail(&mut self, msg: &str) {
        self.details.push(msg.to_string());
    }

    fn show_table(&mut self, table: &Table) {
        self.tables.push(table.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_all_channels() {
        let mut ui = MockUI::new();
        ui.message("planning");
        ui.success("done");
        ui.warning("no snapshot");
        ui.error("build failed");
        ui.skipped("test-16.0.0");
        ui.show_header("Upgrade");
        ui.show_progress(2, 5, "Build");

        assert!(ui.has_message("plan"));
        assert!(ui.has_success("done"));
        assert!(ui.has_warning("snapshot"));
        assert!(ui.has_error("build"));
        assert!(ui.has_skip("test-16"));
        assert_eq!(ui.headers(), ["Upgrade"]);
        assert_eq!(ui.progress(), [(2, 5, "Build".to_string())]);
    }

    #[test]
    fn tables_are_stored_rendered() {
        let mut ui = MockUI::new();
        let mut table = Table::new(&["Step"]);
        table.add_row(&["report"]);

        ui.show_table(&table);

        assert!(ui.tables()[0].contains("report"));
    }

    #[test]
    fn default_mode_is_normal() {
        assert_eq!(MockUI::new().output_mode(), OutputMode::Normal);
        assert_eq!(
            MockUI::with_mode(OutputMode::Verbose).output_mode(),
            OutputMode::Verbose
        );
    }
}
