//! Handler registry.
//!
//! Steps name their handler with a string. The set of handler kinds is
//! closed ([`HandlerKind`]); names are parsed when a handler is registered
//! or looked up, so an unknown name fails as a configuration error.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{LeapfrogError, Result};
use crate::plan::{MigrationContext, Step};

/// Capability every step handler provides.
pub trait StepHandler {
    /// Run the step to completion.
    ///
    /// Any error is accepted; the engine classifies it with
    /// [`crate::error::classify`].
    fn run(
        &self,
        context: &MigrationContext,
        payload: Option<&serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value>;
}

impl<F> StepHandler for F
where
    F: Fn(&MigrationContext, Option<&serde_json::Value>) -> anyhow::Result<serde_json::Value>,
{
    fn run(
        &self,
        context: &MigrationContext,
        payload: Option<&serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value> {
        self(context, payload)
    }
}

/// The fixed set of handler kinds a step may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandlerKind {
    Environment,
    Dependency,
    Build,
    Runtime,
    Router,
    Ui,
    Test,
    Report,
}

impl HandlerKind {
    /// Every kind, in pipeline order.
    pub const ALL: [HandlerKind; 8] = [
        Self::Environment,
        Self::Dependency,
        Self::Build,
        Self::Runtime,
        Self::Router,
        Self::Ui,
        Self::Test,
        Self::Report,
    ];

    /// Handler name as stored on steps.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Self::Environment => "EnvironmentAgent",
            Self::Dependency => "DependencyAgent",
            Self::Build => "BuildAgent",
            Self::Runtime => "RuntimeAgent",
            Self::Router => "RouterAgent",
            Self::Ui => "UIAgent",
            Self::Test => "TestAgent",
            Self::Report => "ReportAgent",
        }
    }

    /// Short lowercase name used in configuration.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Dependency => "dependency",
            Self::Build => "build",
            Self::Runtime => "runtime",
            Self::Router => "router",
            Self::Ui => "ui",
            Self::Test => "test",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

impl FromStr for HandlerKind {
    type Err = LeapfrogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.agent_name() == s || kind.short_name() == s.to_lowercase())
            .ok_or_else(|| LeapfrogError::UnknownHandler {
                name: s.to_string(),
            })
    }
}

/// Maps handler kinds to implementations.
#[derive(Default)]
pub struct AgentRegistry {
    handlers: HashMap<HandlerKind, Box<dyn StepHandler>>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a kind, replacing any previous one.
    pub fn register(&mut self, kind: HandlerKind, handler: impl StepHandler + 'static) {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Register a handler by name.
    ///
    /// Fails with [`LeapfrogError::UnknownHandler`] if the name is not a
    /// handler kind.
    pub fn register_named(&mut self, name: &str, handler: impl StepHandler + 'static) -> Result<()> {
        let kind = name.parse()?;
        self.register(kind, handler);
        Ok(())
    }

    /// Registered kinds, in pipeline order.
    pub fn kinds(&self) -> Vec<HandlerKind> {
        HandlerKind::ALL
            .into_iter()
            .filter(|k| self.handlers.contains_key(k))
            .collect()
    }

    /// Check if a kind has a handler.
    pub fn contains(&self, kind: HandlerKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Look up the handler for a step's handler name.
    pub fn resolve(&self, name: &str) -> Result<&dyn StepHandler> {
        let kind: HandlerKind = name.parse()?;
        self.handlers
            .get(&kind)
            .map(|h| h.as_ref())
            .ok_or_else(|| LeapfrogError::UnknownHandler {
                name: name.to_string(),
            })
    }

    /// Check every step names a registered handler.
    pub fn validate(&self, steps: &[Step]) -> Result<()> {
        for step in steps {
            self.resolve(&step.handler_name)?;
        }
        Ok(())
    }
}
