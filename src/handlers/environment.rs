//! Toolchain checks run before each hop.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ClassifiedError;
use crate::plan::MigrationContext;
use crate::resolver::Range;
use crate::runner::StepHandler;
use crate::shell::{execute_program, CommandOptions};

use super::parse_payload;

static NODE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+\.\d+\.\d+)").unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EnvironmentPayload {
    node_range: Option<String>,
}

/// Extract the version from `node --version` output.
pub fn parse_node_version(output: &str) -> Option<semver::Version> {
    let caps = NODE_VERSION.captures(output)?;
    semver::Version::parse(&caps[1]).ok()
}

/// Check a Node.js version against a required range.
pub fn check_node_version(version: &semver::Version, range: &str) -> Result<(), ClassifiedError> {
    let range = Range::parse(range).map_err(|e| ClassifiedError::environment(e.to_string()))?;
    if range.matches(version) {
        Ok(())
    } else {
        Err(ClassifiedError::environment(format!(
            "Node version {} does not satisfy required range {}",
            version, range
        )))
    }
}

/// Verifies Node.js and git are installed and compatible.
#[derive(Debug, Clone)]
pub struct EnvironmentHandler {
    node: String,
    git: String,
}

impl Default for EnvironmentHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentHandler {
    pub fn new() -> Self {
        Self::with_programs("node", "git")
    }

    /// Use different executables for the node and git probes.
    pub fn with_programs(node: impl Into<String>, git: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            git: git.into(),
        }
    }

    fn probe(&self, program: &str, context: &MigrationContext) -> Option<String> {
        execute_program(
            program,
            &["--version"],
            &CommandOptions::captured(Some(context.project_root())),
        )
        .ok()
        .filter(|r| r.success)
        .map(|r| r.stdout.trim().to_string())
    }
}

impl StepHandler for EnvironmentHandler {
    fn run(&self, context: &MigrationContext, payload: Option<&Value>) -> anyhow::Result<Value> {
        let payload: EnvironmentPayload = parse_payload(payload)?;
        info!("Checking environment compatibility");

        let output = self.probe(&self.node, context).ok_or_else(|| {
            ClassifiedError::environment("Node.js is not installed or not in PATH")
        })?;
        let node = parse_node_version(&output).ok_or_else(|| {
            ClassifiedError::environment(format!("Cannot read Node.js version from '{}'", output))
        })?;
        info!("Node: {}", node);

        match &payload.node_range {
            Some(range) => check_node_version(&node, range)?,
            None => warn!("No Node.js range recorded for this version; skipping range check"),
        }

        let git = self
            .probe(&self.git, context)
            .ok_or_else(|| ClassifiedError::environment("Git is not installed or not in PATH"))?;
        info!("{}", git);

        Ok(json!({ "node": node.to_string() }))
    }
}
