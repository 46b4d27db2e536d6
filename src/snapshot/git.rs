//! Git-backed snapshots.
//!
//! A snapshot is a branch pointing at `HEAD`. Only a clean work tree can
//! be snapshotted, since uncommitted changes would not be captured.

use std::path::Path;

use chrono::Utc;
use tracing::debug;

use crate::error::{LeapfrogError, Result};
use crate::shell::{execute_program, CommandOptions, CommandResult};

use super::SnapshotProvider;

/// Prefix of snapshot branch names.
pub const BRANCH_PREFIX: &str = "leapfrog/snapshot";

/// Snapshots a git work tree as branches.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitSnapshotProvider;

impl GitSnapshotProvider {
    pub fn new() -> Self {
        Self
    }

    fn git(path: &Path, args: &[&str]) -> Result<CommandResult> {
        let result = execute_program("git", args, &CommandOptions::captured(Some(path)))?;
        if result.success {
            Ok(result)
        } else {
            Err(LeapfrogError::SnapshotFailed {
                message: format!(
                    "git {} failed: {}",
                    args.join(" "),
                    result.error_summary().unwrap_or("unknown error")
                ),
            })
        }
    }
}

impl SnapshotProvider for GitSnapshotProvider {
    fn create(&self, path: &Path, label: &str) -> Result<String> {
        Self::git(path, &["rev-parse", "--is-inside-work-tree"]).map_err(|_| {
            LeapfrogError::SnapshotFailed {
                message: format!("{} is not a git work tree", path.display()),
            }
        })?;

        let status = Self::git(path, &["status", "--porcelain"])?;
        if !status.stdout.trim().is_empty() {
            return Err(LeapfrogError::SnapshotFailed {
                message: "working tree has uncommitted changes".to_string(),
            });
        }

        let branch = format!("{}/{}-{}", BRANCH_PREFIX, label, Utc::now().timestamp_millis());
        Self::git(path, &["branch", &branch, "HEAD"])?;
        debug!("Created snapshot branch {}", branch);

        Ok(branch)
    }

    fn restore(&self, path: &Path, snapshot_id: &str) -> Result<()> {
        Self::git(path, &["reset", "--hard", snapshot_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::execute_check;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        execute_check("git --version", None)
    }

    fn repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        let path = temp.path();
        for args in [
            &["init", "-q"][..],
            &["config", "user.email", "dev@example.com"],
            &["config", "user.name", "Dev"],
            &["config", "commit.gpgsign", "false"],
        ] {
            GitSnapshotProvider::git(path, args).unwrap();
        }
        fs::write(path.join("package.json"), "{\"version\": \"1.0.0\"}\n").unwrap();
        GitSnapshotProvider::git(path, &["add", "."]).unwrap();
        GitSnapshotProvider::git(path, &["commit", "-q", "-m", "init"]).unwrap();
        temp
    }

    #[test]
    fn create_then_restore_reverts_committed_changes() {
        if !git_available() {
            return;
        }
        let temp = repo();
        let path = temp.path();
        let provider = GitSnapshotProvider::new();

        let id = provider.create(path, "pre-upgrade").unwrap();
        assert!(id.starts_with("leapfrog/snapshot/pre-upgrade-"));

        fs::write(path.join("package.json"), "{\"version\": \"2.0.0\"}\n").unwrap();
        GitSnapshotProvider::git(path, &["commit", "-q", "-am", "upgrade"]).unwrap();

        provider.restore(path, &id).unwrap();
        let content = fs::read_to_string(path.join("package.json")).unwrap();
        assert!(content.contains("1.0.0"));
    }

    #[test]
    fn dirty_tree_cannot_be_snapshotted() {
        if !git_available() {
            return;
        }
        let temp = repo();
        fs::write(temp.path().join("package.json"), "{}\n").unwrap();

        let err = GitSnapshotProvider::new()
            .create(temp.path(), "pre-upgrade")
            .unwrap_err();
        assert!(err.to_string().contains("uncommitted"));
    }

    #[test]
    fn non_repository_cannot_be_snapshotted() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let err = GitSnapshotProvider::new()
            .create(temp.path(), "pre-upgrade")
            .unwrap_err();
        assert!(matches!(err, LeapfrogError::SnapshotFailed { .. }));
    }

    #[test]
    fn restore_unknown_snapshot_fails() {
        if !git_available() {
            return;
        }
        let temp = repo();
        assert!(GitSnapshotProvider::new()
            .restore(temp.path(), "leapfrog/snapshot/missing-1")
            .is_err());
    }
}
