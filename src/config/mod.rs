//! Configuration loading, merging, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Deep merging in [`merger`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use leapfrog::config::{load_merged_config, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let dir = temp.path().join(".leapfrog");
//! fs::create_dir_all(&dir).unwrap();
//! fs::write(dir.join("config.yml"), "project:\n  target_version: '17.0.0'\n").unwrap();
//!
//! let config = load_merged_config(temp.path()).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.project.target_version.as_deref(), Some("17.0.0"));
//! ```
//!
//! # Configuration File Locations
//!
//! Leapfrog discovers and merges configuration in this order:
//! 1. User global config (`~/.leapfrog/config.yml`)
//! 2. Project config (`.leapfrog/config.yml`)
//! 3. Local overrides (`.leapfrog/config.local.yml`)

pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

use std::path::PathBuf;

pub use loader::{
    find_project_root, load_config, load_config_file, load_merged_config, parse_config,
    ConfigPaths, CONFIG_DIR,
};
pub use merger::{deep_merge, merge_configs};
pub use schema::{
    HandlerConfig, LeapfrogConfig, OutputMode, ProjectConfig, ProviderKind, ResolverConfig,
    Settings, HANDLER_KEYS,
};
pub use validator::{validate, validate_config, ValidationError};

/// Environment variable overriding the Leapfrog home directory.
pub const HOME_ENV: &str = "LEAPFROG_HOME";

/// Directory for global config and per-project state.
///
/// `$LEAPFROG_HOME` if set, otherwise `~/.leapfrog`.
pub fn leapfrog_home() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|h| h.join(".leapfrog"))
        .unwrap_or_else(|| PathBuf::from(".leapfrog"))
}
