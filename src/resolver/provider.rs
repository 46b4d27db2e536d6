//! Package metadata providers.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LeapfrogError, Result};
use crate::shell::{execute_program, CommandOptions};

use super::range::{coerce, Range};

/// Published metadata for one version of a package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub dependencies: BTreeMap<String, String>,
    pub peer_dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
}

impl PackageInfo {
    /// Create metadata with no dependencies.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Add a regular dependency.
    pub fn dependency(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), range.into());
        self
    }

    /// Add a peer dependency.
    pub fn peer(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.peer_dependencies.insert(name.into(), range.into());
        self
    }

    /// Add an optional dependency.
    pub fn optional(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.optional_dependencies.insert(name.into(), range.into());
        self
    }
}

/// Source of package metadata.
pub trait MetadataProvider {
    /// Metadata for the version of `name` that best matches `range`, or
    /// `None` if no such package or version exists.
    fn fetch(&self, name: &str, range: &str) -> Option<PackageInfo>;
}

/// In-memory catalog of published versions.
///
/// Catalog files map package names to their published versions:
///
/// ```yaml
/// "@angular/core":
///   - version: 17.3.0
///     peerDependencies:
///       rxjs: ^6.5.3 || ^7.4.0
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    packages: BTreeMap<String, Vec<PackageInfo>>,
}

impl StaticProvider {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a published version.
    pub fn with(mut self, info: PackageInfo) -> Self {
        self.add(info);
        self
    }

    /// Add a published version.
    pub fn add(&mut self, info: PackageInfo) {
        self.packages.entry(info.name.clone()).or_default().push(info);
    }

    /// Parse a YAML (or JSON) catalog.
    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let raw: BTreeMap<String, Vec<PackageInfo>> = serde_yaml::from_str(content)?;
        let mut provider = Self::new();
        for (name, versions) in raw {
            for mut info in versions {
                info.name = name.clone();
                provider.add(info);
            }
        }
        Ok(provider)
    }

    /// Load a catalog file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| LeapfrogError::ConfigNotFound {
            path: path.to_path_buf(),
        })?;
        Self::from_yaml_str(&content).map_err(|e| LeapfrogError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Number of packages in the catalog.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl MetadataProvider for StaticProvider {
    fn fetch(&self, name: &str, range: &str) -> Option<PackageInfo> {
        let range = Range::lenient(range);
        self.packages
            .get(name)?
            .iter()
            .filter_map(|info| coerce(&info.version).map(|v| (v, info)))
            .filter(|(v, _)| range.selects(v))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, info)| info.clone())
    }
}

/// Queries the npm registry through the `npm` CLI.
#[derive(Debug, Clone, Default)]
pub struct NpmProvider {
    registry: Option<String>,
}

impl NpmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query a specific registry instead of the configured default.
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    fn view(&self, name: &str, range: &str) -> Result<serde_json::Value> {
        let spec = format!("{}@{}", name, range);
        let mut args = vec!["view", spec.as_str(), "--json"];
        if let Some(registry) = &self.registry {
            args.push("--registry");
            args.push(registry);
        }

        let result = execute_program("npm", &args, &CommandOptions::captured(None))?;
        if !result.success {
            return Err(LeapfrogError::CommandFailed {
                command: format!("npm view {}", spec),
                code: result.exit_code,
            });
        }
        serde_json::from_str(&result.stdout).map_err(|e| LeapfrogError::Other(e.into()))
    }
}

/// Pick the highest version from `npm view` output, which is a single
/// object for one match and an array for several.
fn highest_from_view(data: serde_json::Value) -> Option<PackageInfo> {
    let entries = match data {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => vec![data],
        _ => return None,
    };
    entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<PackageInfo>(entry).ok())
        .filter_map(|info| coerce(&info.version).map(|v| (v, info)))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, info)| info)
}

impl MetadataProvider for NpmProvider {
    fn fetch(&self, name: &str, range: &str) -> Option<PackageInfo> {
        debug!("Fetching {}@{} from npm", name, range);
        match self.view(name, range) {
            Ok(data) => highest_from_view(data),
            Err(e) => {
                warn!("Failed to fetch {}@{}: {}", name, range, e);
                None
            }
        }
    }
}
