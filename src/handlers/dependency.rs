//! Manifest upgrade step.
//!
//! Reads `package.json`, applies the version's package updates, resolves
//! the resulting tree and reports conflicts. Unless running dry, the
//! updated manifest is written back and the install command is run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::HandlerConfig;
use crate::error::{ClassifiedError, LeapfrogError};
use crate::plan::MigrationContext;
use crate::resolver::{ConflictKind, DependencyResolver, MetadataProvider, Resolution};
use crate::runner::StepHandler;

use super::command::{run_with_retries, step_options};
use super::parse_payload;

/// Manifest file name in the project root.
pub const MANIFEST_FILE: &str = "package.json";

/// Manifest sections read and updated, in lookup order.
pub const SECTIONS: [&str; 2] = ["dependencies", "devDependencies"];

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DependencyPayload {
    target_version: Option<String>,
    updates: BTreeMap<String, String>,
}

/// A parsed `package.json`.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    document: Value,
}

impl Manifest {
    /// Read `package.json` from a project root.
    pub fn load(project_root: &Path) -> anyhow::Result<Self> {
        Self::load_file(&project_root.join(MANIFEST_FILE))
    }

    /// Read a manifest from an explicit path.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let path = path.to_path_buf();
        let content = fs::read_to_string(&path)
            .map_err(|e| ClassifiedError::environment(format!("Cannot read {}: {}", path.display(), e)))?;
        let document: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Self { path, document })
    }

    /// Every dependency range across [`SECTIONS`], in document order.
    ///
    /// A package listed in more than one section keeps its first position
    /// and takes the range from the later section.
    pub fn ranges(&self) -> Vec<(String, String)> {
        let mut ranges: Vec<(String, String)> = Vec::new();
        for section in SECTIONS {
            for (name, range) in self.section(section).into_iter().flatten() {
                if let Some(range) = range.as_str() {
                    set_entry(&mut ranges, name, range);
                }
            }
        }
        ranges
    }

    /// Set the range of a package in every section that lists it.
    ///
    /// Returns whether any section listed the package.
    pub fn set_range(&mut self, name: &str, range: &str) -> bool {
        let mut found = false;
        for section in SECTIONS {
            if let Some(entries) = self.document.get_mut(section).and_then(Value::as_object_mut) {
                if let Some(entry) = entries.get_mut(name) {
                    *entry = Value::String(range.to_string());
                    found = true;
                }
            }
        }
        found
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let mut content = serde_json::to_string_pretty(&self.document)?;
        content.push('\n');
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.document.get(name).and_then(Value::as_object)
    }
}

fn set_entry(ranges: &mut Vec<(String, String)>, name: &str, range: &str) {
    match ranges.iter_mut().find(|(n, _)| n == name) {
        Some(entry) => entry.1 = range.to_string(),
        None => ranges.push((name.to_string(), range.to_string())),
    }
}

/// Upgrades `package.json` and installs the result.
pub struct DependencyHandler {
    provider: Box<dyn MetadataProvider>,
    install: Option<HandlerConfig>,
}

impl DependencyHandler {
    pub fn new(provider: Box<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            install: None,
        }
    }

    /// Run this install command after the manifest is written.
    pub fn with_install(mut self, install: HandlerConfig) -> Self {
        self.install = Some(install);
        self
    }

    fn report(resolution: &Resolution) {
        info!(
            "Dependency analysis: {} packages, {} conflicts",
            resolution.size(),
            resolution.conflicts.len()
        );
        for conflict in resolution.errors() {
            warn!(
                "Conflict on {} ({:?}): requested by {}; versions {}",
                conflict.package_name,
                conflict.kind,
                conflict.requested_by.iter().cloned().collect::<Vec<_>>().join(", "),
                conflict.versions.join(", ")
            );
        }
        for conflict in resolution.warnings() {
            info!(
                "{}: {}",
                conflict.package_name,
                conflict.resolution.as_deref().unwrap_or("check manually")
            );
        }
    }
}

impl StepHandler for DependencyHandler {
    fn run(&self, context: &MigrationContext, payload: Option<&Value>) -> anyhow::Result<Value> {
        let payload: DependencyPayload = parse_payload(payload)?;
        let target = payload
            .target_version
            .as_deref()
            .or(context.target_version.as_deref())
            .unwrap_or("latest");
        info!("Resolving dependencies for {}", target);

        let mut manifest = Manifest::load(context.project_root())?;
        let mut ranges = manifest.ranges();

        let mut updated = Vec::new();
        for (name, range) in &payload.updates {
            if manifest.set_range(name, range) {
                set_entry(&mut ranges, name, range);
                updated.push(name.clone());
            } else {
                info!("{} is not in package.json; not adding it", name);
            }
        }

        let resolution = DependencyResolver::new(self.provider.as_ref()).resolve(&ranges);
        Self::report(&resolution);

        let errors = resolution.errors().count();
        if context.strict && errors > 0 {
            let names: Vec<&str> = resolution
                .errors()
                .map(|c| c.package_name.as_str())
                .collect();
            return Err(LeapfrogError::DependencyResolution {
                message: format!(
                    "{} unresolved dependency conflict(s): {}",
                    errors,
                    names.join(", ")
                ),
                conflicts: errors,
            }
            .into());
        }

        for conflict in resolution.warnings() {
            if conflict.kind != ConflictKind::Version {
                continue;
            }
            if let Some(version) = conflict.suggested_version() {
                let range = format!("^{}", version);
                if manifest.set_range(&conflict.package_name, &range) {
                    info!("Pinned {} to {}", conflict.package_name, range);
                    updated.push(conflict.package_name.clone());
                }
            }
        }

        let summary = json!({
            "targetVersion": target,
            "packages": resolution.size(),
            "conflicts": resolution.conflicts.len(),
            "errors": errors,
            "updated": updated,
        });

        if context.dry_run {
            info!("[dry run] Would update {} package(s) in package.json", updated.len());
            return Ok(summary);
        }

        manifest.save()?;
        info!("Updated {} package(s) in package.json", updated.len());

        if let Some(command) = self.install.as_ref().and_then(|i| i.command.as_deref()) {
            let attempts = self.install.as_ref().map_or(1, |i| i.attempts);
            let options = step_options(context, payload.target_version.as_deref());
            run_with_retries("install", command, attempts, &options)?;
            info!("Dependencies installed");
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, ErrorClassification};
    use crate::resolver::{PackageInfo, StaticProvider};
    use tempfile::TempDir;

    const PACKAGE_JSON: &str = r#"{
  "name": "shop",
  "version": "1.0.0",
  "dependencies": {
    "@angular/core": "^15.2.0",
    "rxjs": "~7.8.0"
  },
  "devDependencies": {
    "typescript": "~4.9.0"
  }
}
"#;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("package.json"), PACKAGE_JSON).unwrap();
        temp
    }

    fn catalog() -> StaticProvider {
        StaticProvider::new()
            .with(PackageInfo::new("@angular/core", "15.2.9").peer("rxjs", "^6.5.3 || ^7.4.0"))
            .with(
                PackageInfo::new("@angular/core", "16.2.12")
                    .peer("rxjs", "^6.5.3 || ^7.4.0")
                    .peer("typescript", ">=5.0.0 <5.2"),
            )
            .with(PackageInfo::new("rxjs", "7.8.1"))
            .with(PackageInfo::new("typescript", "4.9.5"))
            .with(PackageInfo::new("typescript", "5.1.6"))
    }

    fn payload(updates: &[(&str, &str)]) -> Value {
        let updates: BTreeMap<_, _> = updates.iter().copied().collect();
        json!({ "targetVersion": "16.0.0", "updates": updates })
    }

    fn read(temp: &TempDir) -> Value {
        serde_json::from_str(&fs::read_to_string(temp.path().join("package.json")).unwrap()).unwrap()
    }

    #[test]
    fn applies_updates_to_existing_entries() {
        let temp = project();
        let handler = DependencyHandler::new(Box::new(catalog()));
        let payload = payload(&[("@angular/core", "^16.0.0"), ("typescript", "~5.1.0"), ("zone.js", "~0.13.0")]);

        let value = handler
            .run(&MigrationContext::new(temp.path()), Some(&payload))
            .unwrap();

        let written = read(&temp);
        assert_eq!(written["dependencies"]["@angular/core"], "^16.0.0");
        assert_eq!(written["devDependencies"]["typescript"], "~5.1.0");
        assert!(written["dependencies"].get("zone.js").is_none());
        assert_eq!(written["name"], "shop");
        assert_eq!(value["errors"], 0);
        assert_eq!(value["updated"], json!(["@angular/core", "typescript"]));
    }

    #[test]
    fn manifest_key_order_is_preserved() {
        let temp = project();
        let handler = DependencyHandler::new(Box::new(catalog()));
        let payload = payload(&[("@angular/core", "^16.0.0")]);

        handler
            .run(&MigrationContext::new(temp.path()), Some(&payload))
            .unwrap();

        let content = fs::read_to_string(temp.path().join("package.json")).unwrap();
        let name = content.find("\"name\"").unwrap();
        let deps = content.find("\"dependencies\"").unwrap();
        let dev = content.find("\"devDependencies\"").unwrap();
        assert!(name < deps && deps < dev);
    }

    #[test]
    fn ranges_follow_document_order() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("package.json"),
            r#"{
  "devDependencies": {"typescript": "~5.1.0", "rxjs": "~7.8.1"},
  "dependencies": {"zone.js": "~0.13.0", "rxjs": "~7.8.0", "@angular/core": "^16.0.0"}
}"#,
        )
        .unwrap();

        let ranges = Manifest::load(temp.path()).unwrap().ranges();

        let expected = [
            ("zone.js", "~0.13.0"),
            ("rxjs", "~7.8.1"),
            ("@angular/core", "^16.0.0"),
            ("typescript", "~5.1.0"),
        ];
        let expected: Vec<(String, String)> = expected
            .iter()
            .map(|(n, r)| (n.to_string(), r.to_string()))
            .collect();
        assert_eq!(ranges, expected);
    }

    #[test]
    fn strict_mode_fails_on_unresolved_conflicts() {
        let temp = project();
        let handler = DependencyHandler::new(Box::new(catalog()));
        // typescript stays on 4.9, which the 16.x peer range does not accept
        let payload = payload(&[("@angular/core", "^16.0.0")]);
        let ctx = MigrationContext::new(temp.path()).with_strict(true);

        let err = handler.run(&ctx, Some(&payload)).unwrap_err();

        assert_eq!(classify(&err), (ErrorClassification::DependencyResolution, false));
        assert_eq!(read(&temp)["dependencies"]["@angular/core"], "^15.2.0");
    }

    #[test]
    fn non_strict_mode_reports_and_continues() {
        let temp = project();
        let handler = DependencyHandler::new(Box::new(catalog()));
        let payload = payload(&[("@angular/core", "^16.0.0")]);

        let value = handler
            .run(&MigrationContext::new(temp.path()), Some(&payload))
            .unwrap();

        assert!(value["errors"].as_u64().unwrap() > 0);
        assert_eq!(read(&temp)["dependencies"]["@angular/core"], "^16.0.0");
    }

    #[test]
    fn dry_run_leaves_manifest_untouched() {
        let temp = project();
        let handler = DependencyHandler::new(Box::new(catalog())).with_install(HandlerConfig {
            command: Some("echo installed > installed.txt".to_string()),
            attempts: 1,
        });
        let payload = payload(&[("@angular/core", "^16.0.0")]);
        let ctx = MigrationContext::new(temp.path()).with_dry_run(true);

        handler.run(&ctx, Some(&payload)).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("package.json")).unwrap(),
            PACKAGE_JSON
        );
        assert!(!temp.path().join("installed.txt").exists());
    }

    #[test]
    fn runs_install_after_writing() {
        let temp = project();
        let handler = DependencyHandler::new(Box::new(catalog())).with_install(HandlerConfig {
            command: Some("grep -q 16.0.0 package.json && echo ok > installed.txt".to_string()),
            attempts: 1,
        });
        let payload = payload(&[("@angular/core", "^16.0.0")]);

        handler
            .run(&MigrationContext::new(temp.path()), Some(&payload))
            .unwrap();

        assert!(temp.path().join("installed.txt").exists());
    }

    #[test]
    fn install_failure_is_recoverable_dependency_error() {
        let temp = project();
        let handler = DependencyHandler::new(Box::new(catalog())).with_install(HandlerConfig {
            command: Some("exit 1".to_string()),
            attempts: 2,
        });

        let err = handler
            .run(&MigrationContext::new(temp.path()), None)
            .unwrap_err();

        assert_eq!(classify(&err), (ErrorClassification::DependencyResolution, true));
    }

    #[test]
    fn missing_manifest_is_environment_error() {
        let temp = TempDir::new().unwrap();
        let handler = DependencyHandler::new(Box::new(catalog()));

        let err = handler
            .run(&MigrationContext::new(temp.path()), None)
            .unwrap_err();

        assert_eq!(classify(&err), (ErrorClassification::Environment, false));
    }
}
