//! Upgrade report generation.

use std::fmt::{self, Write};
use std::fs;
use std::rc::Rc;

use anyhow::Context as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::info;

use crate::plan::{MigrationContext, Step, StepStatus};
use crate::runner::StepHandler;
use crate::state::MigrationStore;

/// File written in the project root.
pub const REPORT_FILE: &str = "UPGRADE_REPORT.md";

/// Render the report for a set of recorded tasks.
pub fn render_report(
    context: &MigrationContext,
    tasks: &[Step],
    generated_at: DateTime<Utc>,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_report(&mut out, context, tasks, generated_at)?;
    Ok(out)
}

fn write_report(
    out: &mut impl Write,
    context: &MigrationContext,
    tasks: &[Step],
    generated_at: DateTime<Utc>,
) -> fmt::Result {
    let completed: Vec<&Step> = tasks.iter().filter(|t| t.status == StepStatus::Completed).collect();
    let failed: Vec<&Step> = tasks.iter().filter(|t| t.status == StepStatus::Failed).collect();
    let skipped = tasks.iter().filter(|t| t.status == StepStatus::Skipped).count();

    writeln!(out, "# Upgrade Report\n")?;
    writeln!(out, "## Summary")?;
    writeln!(
        out,
        "- **Target Version**: {}",
        context.target_version.as_deref().unwrap_or("unknown")
    )?;
    if let Some(from) = &context.current_version {
        writeln!(out, "- **From Version**: {}", from)?;
    }
    writeln!(out, "- **Project**: {}", context.project_root().display())?;
    writeln!(
        out,
        "- **Date**: {}\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;

    writeln!(out, "## Results")?;
    writeln!(out, "- Completed Tasks: {}", completed.len())?;
    writeln!(out, "- Failed Tasks: {}", failed.len())?;
    if skipped > 0 {
        writeln!(out, "- Skipped Tasks: {}", skipped)?;
    }
    writeln!(out, "- Total Tasks: {}\n", tasks.len())?;

    writeln!(out, "## Completed Tasks")?;
    for task in &completed {
        writeln!(out, "- [x] {} ({})", task.description, task.handler_name)?;
    }
    writeln!(out)?;

    if !failed.is_empty() {
        writeln!(out, "## Failed Tasks")?;
        for task in &failed {
            writeln!(out, "- [ ] {} ({})", task.description, task.handler_name)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Recommendations")?;
    if failed.is_empty() {
        writeln!(out, "- Upgrade completed successfully")?;
        writeln!(out, "- Run the test suite to verify the upgrade")?;
        writeln!(out, "- Review breaking changes in your application code")?;
    } else {
        for task in &failed {
            writeln!(out, "- Review and fix: {}", task.description)?;
        }
    }
    Ok(())
}

/// Writes [`REPORT_FILE`] from the tasks recorded in the store.
pub struct ReportHandler {
    store: Rc<dyn MigrationStore>,
}

impl ReportHandler {
    pub fn new(store: Rc<dyn MigrationStore>) -> Self {
        Self { store }
    }
}

impl StepHandler for ReportHandler {
    fn run(&self, context: &MigrationContext, _payload: Option<&Value>) -> anyhow::Result<Value> {
        info!("Generating upgrade report");
        let tasks = self.store.all_tasks()?;
        let report = render_report(context, &tasks, Utc::now())?;
        let path = context.project_root().join(REPORT_FILE);

        if context.dry_run {
            info!("[dry run] Would write {}", path.display());
        } else {
            fs::write(&path, &report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report generated: {}", path.display());
        }

        Ok(json!({ "path": path.display().to_string(), "tasks": tasks.len() }))
    }
}
