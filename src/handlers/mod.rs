//! Built-in step handlers.
//!
//! - [`EnvironmentHandler`] checks the Node.js and git toolchain
//! - [`DependencyHandler`] upgrades `package.json` and installs it
//! - [`CommandHandler`] runs build, test and code-fix commands
//! - [`ReportHandler`] writes the upgrade report
//!
//! [`build_registry`] wires them up from a [`LeapfrogConfig`].

pub mod command;
pub mod dependency;
pub mod environment;
pub mod report;

use std::path::Path;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::{LeapfrogConfig, ProviderKind};
use crate::error::{ClassifiedError, ErrorClassification, LeapfrogError, Result};
use crate::resolver::{MetadataProvider, NpmProvider, StaticProvider};
use crate::runner::{AgentRegistry, HandlerKind};
use crate::state::MigrationStore;

pub use command::{CommandHandler, TARGET_VERSION_ENV};
pub use dependency::{DependencyHandler, Manifest, MANIFEST_FILE};
pub use environment::EnvironmentHandler;
pub use report::{render_report, ReportHandler, REPORT_FILE};

/// Deserialize a step payload, treating a missing payload as the default.
pub(crate) fn parse_payload<T>(payload: Option<&Value>) -> anyhow::Result<T>
where
    T: DeserializeOwned + Default,
{
    match payload {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            ClassifiedError::new(
                ErrorClassification::ConfigurationError,
                false,
                format!("invalid step payload: {}", e),
            )
            .into()
        }),
    }
}

/// Metadata provider selected by the `resolver` config section.
pub fn metadata_provider(
    config: &LeapfrogConfig,
    project_root: &Path,
) -> Result<Box<dyn MetadataProvider>> {
    match config.resolver.provider {
        ProviderKind::Npm => {
            let mut provider = NpmProvider::new();
            if let Some(registry) = &config.resolver.registry {
                provider = provider.with_registry(registry.clone());
            }
            Ok(Box::new(provider))
        }
        ProviderKind::Catalog => {
            let catalog = config.resolver.catalog.as_ref().ok_or_else(|| {
                LeapfrogError::ConfigValidationError {
                    message: "resolver.catalog is required for the catalog provider".to_string(),
                }
            })?;
            let provider = StaticProvider::from_file(&project_root.join(catalog))?;
            debug!("Loaded catalog with {} packages", provider.len());
            Ok(Box::new(provider))
        }
    }
}

/// Registry of the built-in handlers for a project.
///
/// Code-fix handlers (`runtime`, `router`, `ui`) are registered only when
/// a command is configured for them.
pub fn build_registry(
    config: &LeapfrogConfig,
    project_root: &Path,
    store: Rc<dyn MigrationStore>,
) -> Result<AgentRegistry> {
    let mut registry = AgentRegistry::new();

    registry.register(HandlerKind::Environment, EnvironmentHandler::new());

    let mut dependency = DependencyHandler::new(metadata_provider(config, project_root)?);
    if let Some(install) = config.handler("install") {
        dependency = dependency.with_install(install);
    }
    registry.register(HandlerKind::Dependency, dependency);

    for kind in [
        HandlerKind::Build,
        HandlerKind::Test,
        HandlerKind::Runtime,
        HandlerKind::Router,
        HandlerKind::Ui,
    ] {
        let key = kind.short_name();
        if let Some(handler) = config
            .handler(key)
            .and_then(|h| CommandHandler::from_config(key, &h))
        {
            registry.register(kind, handler);
        }
    }

    registry.register(HandlerKind::Report, ReportHandler::new(store));

    debug!("Registered handlers: {:?}", registry.kinds());
    Ok(registry)
}
