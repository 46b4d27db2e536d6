//! Resolve command implementation.
//!
//! The `leapfrog resolve` command resolves a manifest's dependency tree
//! and prints the conflicts found.

use crate::cli::args::ResolveArgs;
use crate::error::{LeapfrogError, Result};
use crate::handlers::{metadata_provider, Manifest};
use crate::resolver::{Conflict, DependencyResolver, Resolution};
use crate::ui::{Table, UserInterface};

use super::dispatcher::{Command, CommandResult, ProjectTarget};

/// The resolve command implementation.
pub struct ResolveCommand {
    target: ProjectTarget,
    args: ResolveArgs,
}

impl ResolveCommand {
    /// Create a new resolve command.
    pub fn new(target: ProjectTarget, args: ResolveArgs) -> Self {
        Self { target, args }
    }
}

/// Table of conflicts, one row per conflict.
pub fn conflict_table(conflicts: &[Conflict]) -> Table {
    let mut table = Table::new(&["Package", "Problem", "Severity", "Ranges", "Requested by", "Resolution"]);
    for conflict in conflicts {
        table.add_row(&[
            conflict.package_name.clone(),
            format!("{:?}", conflict.kind),
            conflict.severity.to_string(),
            conflict.versions.join(" vs "),
            conflict
                .requested_by
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            conflict.resolution.clone().unwrap_or_default(),
        ]);
    }
    table
}

fn show_resolution(ui: &mut dyn UserInterface, resolution: &Resolution) {
    ui.message(&format!(
        "Resolved {} packages ({} at the top level)",
        resolution.size(),
        resolution.tree.len()
    ));
    for (name, version) in &resolution.resolved {
        ui.detail(&format!("{}@{}", name, version));
    }

    if resolution.conflicts.is_empty() {
        ui.success("No conflicts");
        return;
    }

    ui.message("");
    ui.show_table(&conflict_table(&resolution.conflicts));
    let errors = resolution.errors().count();
    let warnings = resolution.warnings().count();
    if errors > 0 {
        ui.error(&format!("{} unresolved conflict(s)", errors));
    }
    if warnings > 0 {
        ui.warning(&format!("{} conflict(s) with a suggested fix", warnings));
    }
}

impl Command for ResolveCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.target.load_config(ui)?;
        let strict = self.args.strict || config.settings.strict;

        let path = self.target.root.join(&self.args.manifest);
        let manifest = Manifest::load_file(&path)?;
        let provider = metadata_provider(&config, &self.target.root)?;

        ui.show_header(&format!("Resolving {}", path.display()));
        let resolution = DependencyResolver::new(provider.as_ref()).resolve(&manifest.ranges());
        show_resolution(ui, &resolution);

        if strict && resolution.has_errors() {
            let err = LeapfrogError::DependencyResolution {
                message: "unresolved conflicts in strict mode".to_string(),
                conflicts: resolution.errors().count(),
            };
            ui.error(&err.to_string());
            return Ok(CommandResult::failure(1));
        }
        Ok(CommandResult::success())
    }
}
