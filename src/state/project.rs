//! Project identity.
//!
//! State is stored per project under a key derived from the canonical
//! project path and the `origin` remote, so two clones of the same
//! repository at different paths keep separate upgrade histories.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::handlers::MANIFEST_FILE;
use crate::shell::{execute_program, CommandOptions};

/// Length in bytes of the digest prefix used as the state key.
const KEY_BYTES: usize = 8;

#[derive(Deserialize)]
struct ManifestName {
    name: Option<String>,
}

/// Identity of a project being upgraded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId {
    key: String,
    root: PathBuf,
    remote: Option<String>,
    package_name: Option<String>,
}

impl ProjectId {
    /// Identify the project rooted at `path`.
    ///
    /// # Errors
    ///
    /// Fails if `path` does not exist.
    pub fn from_path(path: &Path) -> Result<Self> {
        let root = path.canonicalize()?;
        let remote = origin_remote(&root);
        let package_name = package_name(&root);
        let key = state_key(&root, remote.as_deref());
        debug!("Project {} has state key {}", root.display(), key);

        Ok(Self {
            key,
            root,
            remote,
            package_name,
        })
    }

    /// Hex state key (16 characters).
    pub fn hash(&self) -> &str {
        &self.key
    }

    /// Canonical project root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// URL of the `origin` remote, if the project is a git checkout with one.
    pub fn git_remote(&self) -> Option<&str> {
        self.remote.as_deref()
    }

    /// Display name: the manifest's `name`, else the directory name.
    pub fn name(&self) -> &str {
        self.package_name
            .as_deref()
            .or_else(|| self.root.file_name().and_then(|n| n.to_str()))
            .unwrap_or("project")
    }
}

fn origin_remote(root: &Path) -> Option<String> {
    let result = execute_program(
        "git",
        &["remote", "get-url", "origin"],
        &CommandOptions::captured(Some(root)),
    )
    .ok()
    .filter(|r| r.success)?;

    Some(result.stdout.trim().to_string()).filter(|url| !url.is_empty())
}

fn package_name(root: &Path) -> Option<String> {
    let content = fs::read_to_string(root.join(MANIFEST_FILE)).ok()?;
    let manifest: ManifestName = serde_json::from_str(&content).ok()?;
    manifest.name.filter(|n| !n.trim().is_empty())
}

fn state_key(root: &Path, remote: Option<&str>) -> String {
    let mut digest = Sha256::new();
    digest.update(root.to_string_lossy().as_bytes());
    if let Some(remote) = remote {
        digest.update(b"\n");
        digest.update(remote.as_bytes());
    }
    hex::encode(&digest.finalize()[..KEY_BYTES])
}
