//! Integration tests for config module public API.

use leapfrog::config::{
    load_config, load_merged_config, validate, LeapfrogConfig, OutputMode, ProviderKind,
};
use std::fs;
use tempfile::TempDir;

#[test]
fn public_api_is_accessible() {
    let _config = LeapfrogConfig::default();
    let _mode = OutputMode::Verbose;
    let _provider = ProviderKind::Catalog;
}

#[test]
fn full_config_workflow() {
    let temp = TempDir::new().unwrap();
    let config_dir = temp.path().join(".leapfrog");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        config_dir.join("config.yml"),
        r#"
project:
  current_version: "15.2.0"
upgrade_path:
  - version: "16.0.0"
    node_range: ">=16.14.0"
    updates:
      "@angular/core": "^16.0.0"
handlers:
  build:
    command: "ng build"
"#,
    )
    .unwrap();

    let config = load_merged_config(temp.path()).unwrap();
    validate(&config).unwrap();

    assert_eq!(config.project.current_version.as_deref(), Some("15.2.0"));
    assert_eq!(config.upgrade_path[0].node_range.as_deref(), Some(">=16.14.0"));
    assert_eq!(
        config.handler("build").unwrap().command.as_deref(),
        Some("ng build")
    );
}

#[test]
fn config_merge_workflow() {
    let temp = TempDir::new().unwrap();
    let config_dir = temp.path().join(".leapfrog");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        config_dir.join("config.yml"),
        r#"
settings:
  output: verbose
  strict: true
handlers:
  install:
    command: "yarn install"
"#,
    )
    .unwrap();

    fs::write(
        config_dir.join("config.local.yml"),
        r#"
settings:
  output: quiet
handlers:
  install:
    command: "yarn install --frozen-lockfile"
"#,
    )
    .unwrap();

    let config = load_merged_config(temp.path()).unwrap();

    // Kept from base
    assert!(config.settings.strict);

    // Overridden by local
    assert_eq!(config.settings.output, OutputMode::Quiet);
    assert_eq!(
        config.handlers["install"].command.as_deref(),
        Some("yarn install --frozen-lockfile")
    );
}

#[test]
fn explicit_config_file_skips_discovery() {
    let temp = TempDir::new().unwrap();
    let config_dir = temp.path().join(".leapfrog");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.yml"), "settings:\n  strict: true\n").unwrap();

    let explicit = temp.path().join("ci.yml");
    fs::write(&explicit, "settings:\n  snapshot: false\n").unwrap();

    let config = load_config(temp.path(), Some(&explicit)).unwrap();

    assert!(!config.settings.snapshot);
    assert!(!config.settings.strict);
}

#[test]
fn validation_rejects_bad_versions() {
    let config: LeapfrogConfig = serde_yaml::from_str(
        r#"
project:
  current_version: "fifteen"
upgrade_path:
  - version: "16.0.0"
"#,
    )
    .unwrap();

    let err = validate(&config).unwrap_err();
    assert!(err.to_string().contains("fifteen"));
}
