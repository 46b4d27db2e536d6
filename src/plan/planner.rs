//! Migration planning.
//!
//! A [`Planner`] turns a [`MigrationContext`] into the step list for a run.
//! [`UpgradePlanner`] walks a configured upgrade path one major version at a
//! time and emits the environment, dependency, code-fix, build and test
//! steps for each hop, followed by a final report.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::resolver::range::coerce;
use crate::runner::HandlerKind;

use super::{MigrationContext, Step};

/// Produces the step list for a run. Called once, during PLANNING.
pub trait Planner {
    /// Emit steps whose dependencies reference only ids emitted here.
    fn plan(&self, context: &MigrationContext) -> anyhow::Result<Vec<Step>>;
}

/// A planner that returns a fixed step list.
#[derive(Debug, Clone, Default)]
pub struct StaticPlan {
    steps: Vec<Step>,
}

impl StaticPlan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

impl Planner for StaticPlan {
    fn plan(&self, _context: &MigrationContext) -> anyhow::Result<Vec<Step>> {
        Ok(self.steps.clone())
    }
}

/// One entry of the upgrade path: a version the project can move to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeHop {
    /// Framework version reached by this hop.
    pub version: String,
    /// Node.js range required by this version.
    pub node_range: Option<String>,
    /// Package ranges to apply to the manifest.
    pub updates: BTreeMap<String, String>,
    /// Breaking changes that need code fixes.
    pub breaking_changes: Vec<String>,
}

/// Plans a hop-by-hop major version upgrade.
#[derive(Debug, Clone)]
pub struct UpgradePlanner {
    path: Vec<UpgradeHop>,
    available: BTreeSet<HandlerKind>,
}

impl UpgradePlanner {
    /// Handler name under which the planner reports itself.
    pub const NAME: &'static str = "VersionPlannerAgent";

    /// Create a planner over an upgrade path. Every handler kind is
    /// considered available.
    pub fn new(path: Vec<UpgradeHop>) -> Self {
        Self {
            path,
            available: HandlerKind::ALL.into_iter().collect(),
        }
    }

    /// Restrict optional code-fix steps to these handler kinds.
    pub fn with_available(mut self, kinds: impl IntoIterator<Item = HandlerKind>) -> Self {
        self.available = kinds.into_iter().collect();
        self
    }

    /// Hops between `current` and `target`, in ascending version order.
    pub fn select_hops(&self, current: &str, target: &str) -> anyhow::Result<Vec<&UpgradeHop>> {
        let current_v = coerce(current).ok_or_else(|| anyhow!("invalid current version '{}'", current))?;
        let target_v = coerce(target).ok_or_else(|| anyhow!("invalid target version '{}'", target))?;

        if target_v < current_v {
            bail!("target version {} is older than current version {}", target, current);
        }

        let mut hops: Vec<(semver::Version, &UpgradeHop)> = self
            .path
            .iter()
            .filter_map(|hop| coerce(&hop.version).map(|v| (v, hop)))
            .filter(|(v, _)| {
                if current_v.major == target_v.major {
                    *v == target_v
                } else {
                    v.major > current_v.major && v.major <= target_v.major
                }
            })
            .collect();
        hops.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(hops.into_iter().map(|(_, hop)| hop).collect())
    }

    fn optional(&self, kind: HandlerKind, hop: &UpgradeHop) -> bool {
        !hop.breaking_changes.is_empty() && self.available.contains(&kind)
    }
}

impl Planner for UpgradePlanner {
    fn plan(&self, context: &MigrationContext) -> anyhow::Result<Vec<Step>> {
        let current = context
            .current_version
            .as_deref()
            .ok_or_else(|| anyhow!("current version is unknown; set project.current_version or pass --from"))?;
        let target = match context.target_version.as_deref() {
            Some(target) => target,
            None => self
                .path
                .iter()
                .filter_map(|hop| coerce(&hop.version).map(|v| (v, hop)))
                .max_by(|a, b| a.0.cmp(&b.0))
                .map(|(_, hop)| hop.version.as_str())
                .ok_or_else(|| anyhow!("no target version and the upgrade path lists no versions"))?,
        };

        info!("Planning upgrade path from {} to {}", current, target);
        let hops = self.select_hops(current, target)?;
        if hops.is_empty() {
            bail!("no upgrade path from {} to {}", current, target);
        }
        debug!(
            "Upgrade path: {}",
            hops.iter().map(|h| h.version.as_str()).collect::<Vec<_>>().join(" -> ")
        );

        let mut steps = Vec::new();
        let mut previous: Option<String> = None;

        for hop in hops {
            let prefix = format!("upgrade-to-{}", hop.version.replace('.', "-"));
            let version = hop.version.as_str();

            let env_id = format!("{}-env", prefix);
            steps.push(
                Step::new(
                    &env_id,
                    "ENVIRONMENT_CHECK",
                    format!("Verify environment for {}", version),
                    HandlerKind::Environment.agent_name(),
                )
                .depends_on(previous.take())
                .with_payload(json!({"targetVersion": version, "nodeRange": hop.node_range})),
            );

            let deps_id = format!("{}-deps", prefix);
            steps.push(
                Step::new(
                    &deps_id,
                    "DEPENDENCY_UPGRADE",
                    format!("Upgrade dependencies to {}", version),
                    HandlerKind::Dependency.agent_name(),
                )
                .depends_on([&env_id])
                .with_payload(json!({"targetVersion": version, "updates": hop.updates})),
            );
            let mut last = deps_id;

            let fixes = [
                (HandlerKind::Runtime, "runtime", "RUNTIME_FIX", "Apply runtime fixes for"),
                (HandlerKind::Router, "router", "ROUTER_FIX", "Update router for"),
                (HandlerKind::Ui, "ui", "UI_MIGRATION", "Migrate UI templates for"),
            ];
            for (kind, suffix, step_kind, verb) in fixes {
                if !self.optional(kind, hop) {
                    continue;
                }
                let id = format!("{}-{}", prefix, suffix);
                steps.push(
                    Step::new(&id, step_kind, format!("{} {}", verb, version), kind.agent_name())
                        .depends_on([&last])
                        .with_payload(json!({
                            "targetVersion": version,
                            "breakingChanges": hop.breaking_changes,
                        })),
                );
                last = id;
            }

            let build_id = format!("{}-build", prefix);
            steps.push(
                Step::new(
                    &build_id,
                    "BUILD_FIX",
                    format!("Build and fix errors for {}", version),
                    HandlerKind::Build.agent_name(),
                )
                .depends_on([&last])
                .with_payload(json!({"targetVersion": version})),
            );

            let test_id = format!("{}-test", prefix);
            steps.push(
                Step::new(
                    &test_id,
                    "TEST",
                    format!("Run tests for {}", version),
                    HandlerKind::Test.agent_name(),
                )
                .depends_on([&build_id])
                .with_payload(json!({"targetVersion": version})),
            );
            previous = Some(test_id);
        }

        steps.push(
            Step::new(
                "final-report",
                "REPORT",
                "Generate upgrade report",
                HandlerKind::Report.agent_name(),
            )
            .depends_on(previous)
            .with_payload(json!({"targetVersion": target})),
        );

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(version: &str, breaking: &[&str]) -> UpgradeHop {
        UpgradeHop {
            version: version.to_string(),
            node_range: Some("^18.19.0".to_string()),
            updates: BTreeMap::from([("@angular/core".to_string(), format!("^{}", version))]),
            breaking_changes: breaking.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn path() -> Vec<UpgradeHop> {
        vec![
            hop("16.0.0", &[]),
            hop("17.0.0", &["control flow syntax"]),
            hop("18.0.0", &[]),
            hop("19.0.0", &["standalone by default"]),
        ]
    }

    fn ids(steps: &[Step]) -> Vec<&str> {
        steps.iter().map(|s| s.id.as_str()).collect()
    }

    fn ctx(from: &str, to: &str) -> MigrationContext {
        MigrationContext::new(".")
            .with_current_version(from)
            .with_target_version(to)
    }

    #[test]
    fn selects_majors_after_current_up_to_target() {
        let planner = UpgradePlanner::new(path());
        let hops = planner.select_hops("16.2.1", "18.0.0").unwrap();
        let versions: Vec<_> = hops.iter().map(|h| h.version.as_str()).collect();
        assert_eq!(versions, vec!["17.0.0", "18.0.0"]);
    }

    #[test]
    fn same_major_selects_exact_target() {
        let planner = UpgradePlanner::new(path());
        let hops = planner.select_hops("18.0.0", "18.0.0").unwrap();
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].version, "18.0.0");
    }

    #[test]
    fn rejects_downgrade() {
        let planner = UpgradePlanner::new(path());
        assert!(planner.select_hops("18.0.0", "16.0.0").is_err());
    }

    #[test]
    fn plan_chains_hops_and_ends_with_report() {
        let planner = UpgradePlanner::new(path());
        let steps = planner.plan(&ctx("17.3.0", "18.0.0")).unwrap();

        assert_eq!(
            ids(&steps),
            vec![
                "upgrade-to-18-0-0-env",
                "upgrade-to-18-0-0-deps",
                "upgrade-to-18-0-0-build",
                "upgrade-to-18-0-0-test",
                "final-report",
            ]
        );
        assert!(steps[0].dependency_ids.is_empty());
        assert_eq!(steps[2].dependency_ids, vec!["upgrade-to-18-0-0-deps"]);
        assert_eq!(steps[4].dependency_ids, vec!["upgrade-to-18-0-0-test"]);
        assert_eq!(steps[4].handler_name, "ReportAgent");
    }

    #[test]
    fn breaking_changes_add_code_fix_steps() {
        let planner = UpgradePlanner::new(path());
        let steps = planner.plan(&ctx("16.0.0", "17.0.0")).unwrap();

        assert_eq!(
            ids(&steps),
            vec![
                "upgrade-to-17-0-0-env",
                "upgrade-to-17-0-0-deps",
                "upgrade-to-17-0-0-runtime",
                "upgrade-to-17-0-0-router",
                "upgrade-to-17-0-0-ui",
                "upgrade-to-17-0-0-build",
                "upgrade-to-17-0-0-test",
                "final-report",
            ]
        );
        assert_eq!(steps[3].dependency_ids, vec!["upgrade-to-17-0-0-runtime"]);
        assert_eq!(steps[5].dependency_ids, vec!["upgrade-to-17-0-0-ui"]);
        assert_eq!(
            steps[2].payload.as_ref().unwrap()["breakingChanges"][0],
            "control flow syntax"
        );
    }

    #[test]
    fn unavailable_fix_kinds_are_not_planned() {
        let planner = UpgradePlanner::new(path()).with_available([
            HandlerKind::Environment,
            HandlerKind::Dependency,
            HandlerKind::Router,
            HandlerKind::Build,
            HandlerKind::Test,
            HandlerKind::Report,
        ]);
        let steps = planner.plan(&ctx("16.0.0", "17.0.0")).unwrap();

        assert!(!ids(&steps).contains(&"upgrade-to-17-0-0-runtime"));
        let router = steps.iter().find(|s| s.id == "upgrade-to-17-0-0-router").unwrap();
        assert_eq!(router.dependency_ids, vec!["upgrade-to-17-0-0-deps"]);
    }

    #[test]
    fn second_hop_waits_for_first_hop_tests() {
        let planner = UpgradePlanner::new(path());
        let steps = planner.plan(&ctx("16.0.0", "18.0.0")).unwrap();
        let env = steps.iter().find(|s| s.id == "upgrade-to-18-0-0-env").unwrap();
        assert_eq!(env.dependency_ids, vec!["upgrade-to-17-0-0-test"]);
    }

    #[test]
    fn dependency_payload_carries_updates() {
        let planner = UpgradePlanner::new(path());
        let steps = planner.plan(&ctx("17.0.0", "18.0.0")).unwrap();
        let payload = steps[1].payload.as_ref().unwrap();
        assert_eq!(payload["targetVersion"], "18.0.0");
        assert_eq!(payload["updates"]["@angular/core"], "^18.0.0");
    }

    #[test]
    fn missing_target_defaults_to_last_hop() {
        let planner = UpgradePlanner::new(path());
        let steps = planner
            .plan(&MigrationContext::new(".").with_current_version("18.1.0"))
            .unwrap();
        assert_eq!(steps[0].id, "upgrade-to-19-0-0-env");
    }

    #[test]
    fn missing_target_defaults_to_highest_hop_in_any_order() {
        let mut shuffled = path();
        shuffled.reverse();
        let planner = UpgradePlanner::new(shuffled);
        let steps = planner
            .plan(&MigrationContext::new(".").with_current_version("17.0.0"))
            .unwrap();

        assert_eq!(steps[0].id, "upgrade-to-18-0-0-env");
        assert_eq!(steps[steps.len() - 1].payload.as_ref().unwrap()["targetVersion"], "19.0.0");
    }

    #[test]
    fn missing_current_version_fails() {
        let planner = UpgradePlanner::new(path());
        let err = planner
            .plan(&MigrationContext::new(".").with_target_version("18.0.0"))
            .unwrap_err();
        assert!(err.to_string().contains("current version"));
    }

    #[test]
    fn empty_path_fails() {
        let planner = UpgradePlanner::new(vec![]);
        assert!(planner.plan(&ctx("16.0.0", "18.0.0")).is_err());
    }

    #[test]
    fn planned_steps_reference_only_planned_ids() {
        let planner = UpgradePlanner::new(path());
        let steps = planner.plan(&ctx("15.0.0", "19.0.0")).unwrap();
        let all: BTreeSet<_> = steps.iter().map(|s| s.id.as_str()).collect();
        for step in &steps {
            for dep in &step.dependency_ids {
                assert!(all.contains(dep.as_str()), "{} -> {}", step.id, dep);
            }
        }
    }
}
