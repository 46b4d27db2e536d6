//! Recursive dependency resolution with conflict detection.
//!
//! [`DependencyResolver::resolve`] walks a manifest depth-first, fetching
//! metadata through a [`MetadataProvider`]. The first resolution recorded
//! for a package name wins; later requests it cannot satisfy become
//! [`Conflict`]s instead of re-resolving. After the walk, peer ranges are
//! validated and error conflicts are checked for a version that satisfies
//! every recorded range.
//!
//! Each call to `resolve` owns its caches; nothing is shared between runs.

pub mod provider;
pub mod range;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use provider::{MetadataProvider, NpmProvider, PackageInfo, StaticProvider};
pub use range::{coerce, intersect, satisfies, Range};

/// Requester recorded for manifest entries.
pub const ROOT: &str = "root";

/// How serious a conflict is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// What kind of incompatibility a conflict describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// No metadata for the requested package or range.
    NotFound,
    /// Two requests for the same package that one version cannot satisfy.
    Version,
    /// A declared peer is not in the tree.
    MissingPeer,
    /// A declared peer is in the tree at a version outside the peer range.
    PeerMismatch,
}

/// An incompatibility found during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub package_name: String,
    pub kind: ConflictKind,
    /// Packages (or [`ROOT`]) that made the conflicting requests.
    pub requested_by: BTreeSet<String>,
    /// Conflicting ranges or versions, in the order they were seen.
    pub versions: Vec<String>,
    pub severity: Severity,
    pub resolution: Option<String>,
    /// Version recorded in the tree for the package, if any.
    pub installed: Option<String>,
}

impl Conflict {
    fn new(package: &str, kind: ConflictKind, requester: &str, severity: Severity) -> Self {
        Self {
            package_name: package.to_string(),
            kind,
            requested_by: BTreeSet::from([requester.to_string()]),
            versions: Vec::new(),
            severity,
            resolution: None,
            installed: None,
        }
    }

    fn versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions = versions.into_iter().map(Into::into).collect();
        self
    }

    fn resolution(mut self, text: impl Into<String>) -> Self {
        self.resolution = Some(text.into());
        self
    }

    /// Check if the conflict is unresolved.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Version proposed by the conflict-resolution pass, if any.
    pub fn suggested_version(&self) -> Option<&str> {
        self.resolution.as_deref()?.strip_prefix("use ")
    }
}

/// A resolved package and its resolved dependency subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionNode {
    pub name: String,
    pub requested_range: String,
    pub resolved_version: String,
    pub dependencies: BTreeMap<String, ResolutionNode>,
    pub peer_dependencies: BTreeMap<String, String>,
}

impl ResolutionNode {
    /// Nodes in this subtree, including this one.
    pub fn size(&self) -> usize {
        1 + self.dependencies.values().map(Self::size).sum::<usize>()
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a ResolutionNode>) {
        out.push(self);
        for child in self.dependencies.values() {
            child.walk(out);
        }
    }
}

/// Result of one resolution run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Top-level packages and their subtrees.
    pub tree: BTreeMap<String, ResolutionNode>,
    pub conflicts: Vec<Conflict>,
    /// Every package name and the version recorded for it.
    pub resolved: BTreeMap<String, String>,
}

impl Resolution {
    /// Nodes in the whole tree.
    pub fn size(&self) -> usize {
        self.tree.values().map(ResolutionNode::size).sum()
    }

    /// Conflicts still at error severity.
    pub fn errors(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| c.is_error())
    }

    /// Conflicts at warning severity.
    pub fn warnings(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| !c.is_error())
    }

    /// Check if any conflict is unresolved.
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Resolves manifests against a metadata provider.
pub struct DependencyResolver<'a> {
    provider: &'a dyn MetadataProvider,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self { provider }
    }

    /// Resolve a manifest of package name to requested range.
    ///
    /// Entries are walked in the order given, so an earlier entry's
    /// resolution wins over a later conflicting request.
    ///
    /// Conflicts are returned as data; deciding whether an error conflict
    /// is fatal is up to the caller.
    pub fn resolve(&self, manifest: &[(String, String)]) -> Resolution {
        info!("Resolving {} packages", manifest.len());

        let mut run = ResolutionRun::new(self.provider);
        let mut tree = BTreeMap::new();
        let mut path = Vec::new();
        let mut on_path = HashSet::new();

        for (name, range) in manifest {
            run.resolve_package(name, range, &mut tree, &mut path, &mut on_path);
        }

        run.validate_peers(&tree);
        run.resolve_conflicts();

        let resolution = Resolution {
            tree,
            conflicts: run.conflicts,
            resolved: run
                .resolutions
                .into_iter()
                .map(|(name, r)| (name, r.version))
                .collect(),
        };
        info!(
            "Resolution complete: {} packages, {} conflicts",
            resolution.resolved.len(),
            resolution.conflicts.len()
        );
        resolution
    }
}

/// The first resolution recorded for a package.
#[derive(Debug, Clone)]
struct Recorded {
    version: String,
    range: String,
    requester: String,
}

/// Mutable state of a single resolution run.
struct ResolutionRun<'a> {
    provider: &'a dyn MetadataProvider,
    /// Fetch results keyed by `name@range`.
    cache: HashMap<String, Option<PackageInfo>>,
    /// Every version fetched per package.
    fetched: HashMap<String, Vec<Version>>,
    resolutions: HashMap<String, Recorded>,
    conflicts: Vec<Conflict>,
}

impl<'a> ResolutionRun<'a> {
    fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self {
            provider,
            cache: HashMap::new(),
            fetched: HashMap::new(),
            resolutions: HashMap::new(),
            conflicts: Vec::new(),
        }
    }

    fn resolve_package(
        &mut self,
        name: &str,
        range: &str,
        siblings: &mut BTreeMap<String, ResolutionNode>,
        path: &mut Vec<String>,
        on_path: &mut HashSet<String>,
    ) {
        if on_path.contains(name) {
            warn!("Circular dependency detected: {} -> {}", path.join(" -> "), name);
            return;
        }

        let requester = path.last().map_or(ROOT, String::as_str).to_string();

        if let Some(existing) = self.resolutions.get(name) {
            if satisfies(&existing.version, range) {
                return;
            }
        }

        let Some(info) = self.fetch(name, range) else {
            self.conflicts.push(
                Conflict::new(name, ConflictKind::NotFound, &requester, Severity::Error)
                    .versions([range])
                    .resolution("package not found"),
            );
            return;
        };

        if let Some(existing) = self.resolutions.get(name).cloned() {
            debug!(
                "{}@{} requested by {} conflicts with {} already resolved for {}",
                name, range, requester, existing.version, existing.range
            );
            self.record_version_conflict(name, &requester, range, existing);
            return;
        }

        self.resolutions.insert(
            name.to_string(),
            Recorded {
                version: info.version.clone(),
                range: range.to_string(),
                requester: requester.clone(),
            },
        );

        let mut node = ResolutionNode {
            name: name.to_string(),
            requested_range: range.to_string(),
            resolved_version: info.version.clone(),
            dependencies: BTreeMap::new(),
            peer_dependencies: info.peer_dependencies.clone(),
        };

        path.push(name.to_string());
        on_path.insert(name.to_string());
        for (dep, dep_range) in info.dependencies.iter().chain(&info.optional_dependencies) {
            self.resolve_package(dep, dep_range, &mut node.dependencies, path, on_path);
        }
        on_path.remove(name);
        path.pop();

        siblings.insert(name.to_string(), node);
    }

    fn fetch(&mut self, name: &str, range: &str) -> Option<PackageInfo> {
        let key = format!("{}@{}", name, range);
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        let info = self.provider.fetch(name, range);
        if let Some(version) = info.as_ref().and_then(|i| coerce(&i.version)) {
            let seen = self.fetched.entry(name.to_string()).or_default();
            if !seen.contains(&version) {
                seen.push(version);
            }
        }
        self.cache.insert(key, info.clone());
        info
    }

    fn record_version_conflict(
        &mut self,
        name: &str,
        requester: &str,
        range: &str,
        existing: Recorded,
    ) {
        let open = self
            .conflicts
            .iter_mut()
            .find(|c| c.kind == ConflictKind::Version && c.package_name == name);

        match open {
            Some(conflict) => {
                conflict.requested_by.insert(requester.to_string());
                if !conflict.versions.iter().any(|v| v == range) {
                    conflict.versions.push(range.to_string());
                }
            }
            None => {
                let mut conflict =
                    Conflict::new(name, ConflictKind::Version, requester, Severity::Error)
                        .versions([existing.range.as_str(), range]);
                conflict.requested_by.insert(existing.requester);
                conflict.installed = Some(existing.version);
                self.conflicts.push(conflict);
            }
        }
    }

    /// Check every node's peer ranges against the recorded resolutions.
    fn validate_peers(&mut self, tree: &BTreeMap<String, ResolutionNode>) {
        debug!("Validating peer dependencies");

        let mut nodes = Vec::new();
        for node in tree.values() {
            node.walk(&mut nodes);
        }

        for node in nodes {
            for (peer, peer_range) in &node.peer_dependencies {
                match self.resolutions.get(peer) {
                    None => self.conflicts.push(
                        Conflict::new(peer, ConflictKind::MissingPeer, &node.name, Severity::Warning)
                            .versions([peer_range.as_str()])
                            .resolution("missing peer dependency"),
                    ),
                    Some(recorded) if !satisfies(&recorded.version, peer_range) => {
                        let installed = recorded.version.clone();
                        let mut conflict = Conflict::new(
                            peer,
                            ConflictKind::PeerMismatch,
                            &node.name,
                            Severity::Error,
                        )
                        .versions([peer_range.as_str(), installed.as_str()])
                        .resolution(format!(
                            "peer mismatch: {} requires {}, installed {}",
                            node.name, peer_range, installed
                        ));
                        conflict.installed = Some(installed);
                        self.conflicts.push(conflict);
                    }
                    Some(_) => {}
                }
            }
        }
    }

    /// Downgrade error conflicts that some version satisfies in full.
    fn resolve_conflicts(&mut self) {
        debug!("Attempting to resolve conflicts");

        for conflict in &mut self.conflicts {
            if !conflict.is_error() || conflict.versions.len() < 2 {
                continue;
            }
            let known = self
                .fetched
                .get(&conflict.package_name)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if let Some(version) = intersect(conflict.versions.as_slice(), known) {
                debug!("Conflict on {} resolved with {}", conflict.package_name, version);
                conflict.resolution = Some(format!("use {}", version));
                conflict.severity = Severity::Warning;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(n, r)| (n.to_string(), r.to_string()))
            .collect()
    }

    fn resolve(provider: &StaticProvider, entries: &[(&str, &str)]) -> Resolution {
        DependencyResolver::new(provider).resolve(&manifest(entries))
    }

    #[test]
    fn single_package_without_dependencies() {
        let provider = StaticProvider::new().with(PackageInfo::new("a", "1.2.0"));
        let result = resolve(&provider, &[("a", "^1.0.0")]);

        assert_eq!(result.size(), 1);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.tree["a"].resolved_version, "1.2.0");
        assert_eq!(result.tree["a"].requested_range, "^1.0.0");
    }

    #[test]
    fn nested_dependencies_form_a_tree() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("a", "1.0.0").dependency("b", "^2.0.0"))
            .with(PackageInfo::new("b", "2.3.0").optional("c", "*"))
            .with(PackageInfo::new("c", "0.1.0"));
        let result = resolve(&provider, &[("a", "^1.0.0")]);

        assert_eq!(result.size(), 3);
        assert_eq!(
            result.tree["a"].dependencies["b"].dependencies["c"].resolved_version,
            "0.1.0"
        );
        assert_eq!(result.resolved.len(), 3);
    }

    #[test]
    fn incompatible_requests_keep_first_resolution() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("a", "1.0.0").dependency("c", "^2.0.0"))
            .with(PackageInfo::new("b", "1.0.0").dependency("c", "^1.0.0"))
            .with(PackageInfo::new("c", "1.5.0"))
            .with(PackageInfo::new("c", "2.1.0"));
        let result = resolve(&provider, &[("a", "^1.0.0"), ("b", "^1.0.0")]);

        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 1);
        let conflict = errors[0];
        assert_eq!(conflict.package_name, "c");
        assert_eq!(conflict.kind, ConflictKind::Version);
        assert_eq!(conflict.versions, vec!["^2.0.0", "^1.0.0"]);
        assert_eq!(conflict.installed.as_deref(), Some("2.1.0"));
        assert_eq!(
            conflict.requested_by,
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
        assert!(conflict.resolution.is_none());

        assert_eq!(result.resolved["c"], "2.1.0");
        assert!(result.tree["b"].dependencies.is_empty());
    }

    #[test]
    fn manifest_order_decides_first_writer() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("zone", "1.0.0").dependency("shared", "^2.0.0"))
            .with(PackageInfo::new("alpha", "1.0.0").dependency("shared", "^1.0.0"))
            .with(PackageInfo::new("shared", "1.4.0"))
            .with(PackageInfo::new("shared", "2.3.0"));
        let result = resolve(&provider, &[("zone", "^1.0.0"), ("alpha", "^1.0.0")]);

        assert_eq!(result.resolved["shared"], "2.3.0");
        assert!(result.tree["zone"].dependencies.contains_key("shared"));
        assert_eq!(result.errors().next().unwrap().versions, vec!["^2.0.0", "^1.0.0"]);
    }

    #[test]
    fn compatible_second_request_is_memoized() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("a", "1.0.0").dependency("c", "^1.2.0"))
            .with(PackageInfo::new("b", "1.0.0").dependency("c", "^1.0.0"))
            .with(PackageInfo::new("c", "1.4.0"));
        let result = resolve(&provider, &[("a", "1"), ("b", "1")]);

        assert!(result.conflicts.is_empty());
        assert!(result.tree["a"].dependencies.contains_key("c"));
        assert!(!result.tree["b"].dependencies.contains_key("c"));
    }

    #[test]
    fn overlapping_requests_are_downgraded_with_resolution() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("a", "1.0.0").dependency("c", "^1.2.0"))
            .with(PackageInfo::new("b", "1.0.0").dependency("c", "~1.5.0"))
            .with(PackageInfo::new("c", "1.5.3"))
            .with(PackageInfo::new("c", "1.9.0"));
        let result = resolve(&provider, &[("a", "^1.0.0"), ("b", "^1.0.0")]);

        assert!(!result.has_errors());
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.severity, Severity::Warning);
        assert_eq!(conflict.resolution.as_deref(), Some("use 1.5.3"));
        assert_eq!(conflict.suggested_version(), Some("1.5.3"));
        assert_eq!(result.resolved["c"], "1.9.0");
    }

    #[test]
    fn circular_dependencies_terminate() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("a", "1.0.0").dependency("b", "^1.0.0"))
            .with(PackageInfo::new("b", "1.1.0").dependency("a", "^1.0.0"));
        let result = resolve(&provider, &[("a", "^1.0.0")]);

        assert!(result.conflicts.is_empty());
        assert_eq!(result.resolved["a"], "1.0.0");
        assert_eq!(result.resolved["b"], "1.1.0");
        assert_eq!(result.size(), 2);
    }

    #[test]
    fn self_dependency_terminates() {
        let provider =
            StaticProvider::new().with(PackageInfo::new("a", "1.0.0").dependency("a", "^2.0.0"));
        let result = resolve(&provider, &[("a", "^1.0.0")]);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.size(), 1);
    }

    #[test]
    fn missing_package_is_not_found_error() {
        let provider = StaticProvider::new();
        let result = resolve(&provider, &[("ghost", "^1.0.0")]);

        assert!(result.tree.is_empty());
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.kind, ConflictKind::NotFound);
        assert_eq!(conflict.severity, Severity::Error);
        assert_eq!(conflict.resolution.as_deref(), Some("package not found"));
        assert!(conflict.requested_by.contains(ROOT));
    }

    #[test]
    fn missing_peer_is_single_warning() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("core", "17.0.0").peer("rxjs", "^7.4.0"));
        let result = resolve(&provider, &[("core", "^17.0.0")]);

        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.kind, ConflictKind::MissingPeer);
        assert_eq!(conflict.severity, Severity::Warning);
        assert_eq!(conflict.package_name, "rxjs");
        assert!(conflict.requested_by.contains("core"));
    }

    #[test]
    fn peer_out_of_range_is_single_error() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("core", "17.0.0").peer("rxjs", "^7.4.0"))
            .with(PackageInfo::new("rxjs", "6.6.7"));
        let result = resolve(&provider, &[("core", "^17.0.0"), ("rxjs", "^6.0.0")]);

        let errors: Vec<_> = result.errors().collect();
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ConflictKind::PeerMismatch);
        assert_eq!(errors[0].installed.as_deref(), Some("6.6.7"));
        assert_eq!(
            errors[0].resolution.as_deref(),
            Some("peer mismatch: core requires ^7.4.0, installed 6.6.7")
        );
    }

    #[test]
    fn peers_of_nested_nodes_are_validated() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("app", "1.0.0").dependency("forms", "^17.0.0"))
            .with(PackageInfo::new("forms", "17.1.0").peer("core", "^17.0.0"));
        let result = resolve(&provider, &[("app", "^1.0.0")]);

        assert_eq!(result.warnings().count(), 1);
        assert_eq!(result.conflicts[0].package_name, "core");
    }

    #[test]
    fn satisfied_peer_raises_nothing() {
        let provider = StaticProvider::new()
            .with(PackageInfo::new("core", "17.0.0").peer("rxjs", "^7.4.0"))
            .with(PackageInfo::new("rxjs", "7.8.1"));
        let result = resolve(&provider, &[("core", "^17.0.0"), ("rxjs", "^7.0.0")]);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn repeated_requests_share_one_fetch() {
        use std::cell::Cell;

        struct Counting<'a> {
            inner: StaticProvider,
            calls: &'a Cell<usize>,
        }
        impl MetadataProvider for Counting<'_> {
            fn fetch(&self, name: &str, range: &str) -> Option<PackageInfo> {
                self.calls.set(self.calls.get() + 1);
                self.inner.fetch(name, range)
            }
        }

        let calls = Cell::new(0);
        let provider = Counting {
            inner: StaticProvider::new()
                .with(PackageInfo::new("a", "1.0.0").dependency("c", "^2.0.0"))
                .with(PackageInfo::new("b", "1.0.0").dependency("c", "^1.0.0"))
                .with(PackageInfo::new("d", "1.0.0").dependency("c", "^1.0.0"))
                .with(PackageInfo::new("c", "1.0.0"))
                .with(PackageInfo::new("c", "2.0.0")),
            calls: &calls,
        };
        let result = DependencyResolver::new(&provider)
            .resolve(&manifest(&[("a", "1"), ("b", "1"), ("d", "1")]));

        // a, b, d, c@^2.0.0 and c@^1.0.0 once each.
        assert_eq!(calls.get(), 5);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(
            result.conflicts[0].requested_by,
            BTreeSet::from(["a".to_string(), "b".to_string(), "d".to_string()])
        );
    }
}
