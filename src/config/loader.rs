//! Configuration file discovery and loading.

use crate::config::leapfrog_home;
use crate::config::merger::merge_configs;
use crate::config::schema::LeapfrogConfig;
use crate::error::{LeapfrogError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding project-level configuration.
pub const CONFIG_DIR: &str = ".leapfrog";

/// Paths to configuration files in priority order (later overrides earlier).
///
/// Merge order:
/// 1. User global config (`$LEAPFROG_HOME/config.yml`)
/// 2. Project config (`.leapfrog/config.yml`)
/// 3. Local overrides (`.leapfrog/config.local.yml`)
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub user_global: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub project_local: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given project root.
    pub fn discover(project_root: &Path) -> Self {
        let config_dir = project_root.join(CONFIG_DIR);
        Self {
            user_global: existing(leapfrog_home().join("config.yml")),
            project: existing(config_dir.join("config.yml")),
            project_local: existing(config_dir.join("config.local.yml")),
        }
    }

    /// Returns all existing config paths in merge order.
    pub fn all_existing(&self) -> Vec<&PathBuf> {
        [&self.user_global, &self.project, &self.project_local]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Check if any project config exists.
    pub fn has_project_config(&self) -> bool {
        self.project.is_some()
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

/// Find the project root by walking up from `start`.
///
/// A directory is a project root if it has a `.leapfrog` directory, a
/// `package.json` or a `.git` entry, checked in that order at each level.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_DIR).is_dir()
            || current.join("package.json").is_file()
            || current.join(".git").exists()
        {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load a single config file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<LeapfrogConfig> {
    let value = load_config_value(path)?;
    from_value(value, path)
}

/// Load a config file as raw YAML, for merging.
pub fn load_config_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LeapfrogError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            LeapfrogError::Io(e)
        }
    })?;

    serde_yaml::from_str(&content).map_err(|e| LeapfrogError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse YAML content into a config.
pub fn parse_config(content: &str, source_path: &Path) -> Result<LeapfrogConfig> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| LeapfrogError::ConfigParseError {
            path: source_path.to_path_buf(),
            message: e.to_string(),
        })?;
    from_value(value, source_path)
}

fn from_value(value: serde_yaml::Value, source_path: &Path) -> Result<LeapfrogConfig> {
    if value.is_null() {
        return Ok(LeapfrogConfig::default());
    }
    serde_yaml::from_value(value).map_err(|e| LeapfrogError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load and merge every config layer that exists for a project.
///
/// A project without any config file gets the defaults.
pub fn load_merged_config(project_root: &Path) -> Result<LeapfrogConfig> {
    let paths = ConfigPaths::discover(project_root);

    let mut layers = Vec::new();
    for path in paths.all_existing() {
        debug!("Loading config layer {}", path.display());
        layers.push(load_config_value(path)?);
    }

    let merged = merge_configs(&layers);
    from_value(merged, &project_root.join(CONFIG_DIR).join("config.yml"))
}

/// Load config with optional path override.
///
/// If `config_override` is provided, loads only that file without merging.
pub fn load_config(project_root: &Path, config_override: Option<&Path>) -> Result<LeapfrogConfig> {
    match config_override {
        Some(path) => load_config_file(path),
        None => load_merged_config(project_root),
    }
}
