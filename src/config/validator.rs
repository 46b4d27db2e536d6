//! Configuration validation rules.
//!
//! - `handlers` keys must name a command-backed handler kind
//! - handler `attempts` must be at least 1
//! - project and upgrade-path versions must parse as versions
//! - `node_range` entries must parse as ranges

use crate::config::schema::{LeapfrogConfig, ProviderKind, HANDLER_KEYS};
use crate::error::{LeapfrogError, Result};
use crate::resolver::range::{coerce, Range};

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    fn new(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
        }
    }
}

/// Validate a configuration and return all errors.
pub fn validate_config(config: &LeapfrogConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_handlers(config));
    errors.extend(validate_versions(config));
    errors.extend(validate_resolver(config));

    errors
}

fn validate_handlers(config: &LeapfrogConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (key, handler) in &config.handlers {
        if !HANDLER_KEYS.contains(&key.as_str()) {
            errors.push(ValidationError::new(
                "unknown-handler",
                format!(
                    "Unknown handler '{}' (expected one of: {})",
                    key,
                    HANDLER_KEYS.join(", ")
                ),
            ));
        }
        if handler.attempts == 0 {
            errors.push(ValidationError::new(
                "invalid-attempts",
                format!("Handler '{}' must have attempts >= 1", key),
            ));
        }
    }

    errors
}

fn validate_versions(config: &LeapfrogConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let project_versions = [
        ("current_version", &config.project.current_version),
        ("target_version", &config.project.target_version),
    ];
    for (field, version) in project_versions {
        if let Some(v) = version {
            if coerce(v).is_none() {
                errors.push(ValidationError::new(
                    "invalid-version",
                    format!("project.{} '{}' is not a version", field, v),
                ));
            }
        }
    }

    for (i, hop) in config.upgrade_path.iter().enumerate() {
        if hop.version.trim().is_empty() {
            errors.push(ValidationError::new(
                "invalid-version",
                format!("upgrade_path[{}] has no version", i),
            ));
        } else if coerce(&hop.version).is_none() {
            errors.push(ValidationError::new(
                "invalid-version",
                format!("upgrade_path[{}] version '{}' is not a version", i, hop.version),
            ));
        }

        if let Some(range) = &hop.node_range {
            if let Err(e) = Range::parse(range) {
                errors.push(ValidationError::new("invalid-range", e.to_string()));
            }
        }
    }

    errors
}

fn validate_resolver(config: &LeapfrogConfig) -> Vec<ValidationError> {
    if config.resolver.provider == ProviderKind::Catalog && config.resolver.catalog.is_none() {
        return vec![ValidationError::new(
            "missing-catalog",
            "resolver.provider is 'catalog' but resolver.catalog is not set".to_string(),
        )];
    }
    Vec::new()
}

/// Validate and return a single error listing every problem.
pub fn validate(config: &LeapfrogConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(LeapfrogError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
