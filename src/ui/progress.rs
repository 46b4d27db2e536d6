//! Formatting helpers for progress and status output.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::plan::StepStatus;

/// Single-character marker for a step status.
pub fn status_symbol(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "·",
        StepStatus::InProgress => "▸",
        StepStatus::Completed => "✓",
        StepStatus::Failed => "✗",
        StepStatus::Skipped => "○",
    }
}

/// Format a timestamp relative to now ("3 hours ago").
pub fn format_relative_time(timestamp: DateTime<Utc>) -> String {
    format_relative_to(timestamp, Utc::now())
}

fn format_relative_to(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(timestamp).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let units = [
        (60 * 60 * 24 * 365, "year"),
        (60 * 60 * 24 * 30, "month"),
        (60 * 60 * 24, "day"),
        (60 * 60, "hour"),
        (60, "minute"),
    ];

    for (size, unit) in units {
        let count = seconds / size;
        if count >= 1 {
            return match (unit, count) {
                ("day", 1) => "yesterday".to_string(),
                (_, 1) => format!("1 {} ago", unit),
                _ => format!("{} {}s ago", count, unit),
            };
        }
    }

    "just now".to_string()
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
