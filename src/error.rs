//! Error types for Leapfrog operations.
//!
//! This module defines [`LeapfrogError`], the primary error type used
//! throughout the crate, a [`Result`] type alias, and the error taxonomy
//! used to classify step failures.
//!
//! # Error Handling Strategy
//!
//! - Use `LeapfrogError` for domain errors that need distinct handling
//! - Step handlers return `anyhow::Error`; raise a [`ClassifiedError`] when
//!   the failure class is known
//! - [`classify`] tags every handler error with exactly one
//!   [`ErrorClassification`] and a recoverable flag

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for Leapfrog operations.
#[derive(Debug, Error)]
pub enum LeapfrogError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// A step id was added to the task graph twice.
    #[error("Duplicate step id: {id}")]
    DuplicateStep { id: String },

    /// A step names a handler that is not registered.
    #[error("Unknown handler: {name}")]
    UnknownHandler { name: String },

    /// Step dependency cycle detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// Unresolved error-severity dependency conflicts in strict mode.
    #[error("Dependency resolution failed: {message}")]
    DependencyResolution { message: String, conflicts: usize },

    /// A version or version range could not be parsed.
    #[error("Invalid version range '{range}': {message}")]
    InvalidRange { range: String, message: String },

    /// Shell command failed.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// A restore point could not be created or restored.
    #[error("Snapshot failed: {message}")]
    SnapshotFailed { message: String },

    /// The migration run ended in the FAILED phase.
    #[error("Migration failed ({classification}): {message}")]
    MigrationFailed {
        message: String,
        classification: ErrorClassification,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Leapfrog operations.
pub type Result<T> = std::result::Result<T, LeapfrogError>;

/// Classification tag attached to every failure the engine observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClassification {
    Environment,
    DependencyResolution,
    VersionSkew,
    ToolchainIncompatibility,
    LibraryDeprecation,
    CompilerIncompatibility,
    ArchitectureMismatch,
    ConfigurationError,
    RoutingConfig,
    PresentationLayer,
    RuntimeHydration,
    TestFailure,
    UnclassifiedRuntimeChange,
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Environment => "Environment",
            Self::DependencyResolution => "DependencyResolution",
            Self::VersionSkew => "VersionSkew",
            Self::ToolchainIncompatibility => "ToolchainIncompatibility",
            Self::LibraryDeprecation => "LibraryDeprecation",
            Self::CompilerIncompatibility => "CompilerIncompatibility",
            Self::ArchitectureMismatch => "ArchitectureMismatch",
            Self::ConfigurationError => "ConfigurationError",
            Self::RoutingConfig => "RoutingConfig",
            Self::PresentationLayer => "PresentationLayer",
            Self::RuntimeHydration => "RuntimeHydration",
            Self::TestFailure => "TestFailure",
            Self::UnclassifiedRuntimeChange => "UnclassifiedRuntimeChange",
        };
        f.write_str(name)
    }
}

/// A handler failure whose class is known at the point it is raised.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub classification: ErrorClassification,
    pub recoverable: bool,
    pub message: String,
}

impl ClassifiedError {
    /// Create a classified error.
    pub fn new(
        classification: ErrorClassification,
        recoverable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            classification,
            recoverable,
            message: message.into(),
        }
    }

    /// Missing or incompatible tooling. Never recoverable.
    pub fn environment(message: impl Into<String>) -> Self {
        Self::new(ErrorClassification::Environment, false, message)
    }

    /// Dependency resolution or install failure.
    pub fn dependency(message: impl Into<String>, recoverable: bool) -> Self {
        Self::new(ErrorClassification::DependencyResolution, recoverable, message)
    }

    /// Build failure after the handler exhausted its repair attempts.
    pub fn build(message: impl Into<String>) -> Self {
        Self::new(ErrorClassification::CompilerIncompatibility, true, message)
    }

    /// Test suite failure.
    pub fn test_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorClassification::TestFailure, true, message)
    }

    /// Required toolchain is present but unusable.
    pub fn toolchain(message: impl Into<String>) -> Self {
        Self::new(ErrorClassification::ToolchainIncompatibility, false, message)
    }
}

/// Classify a handler error.
///
/// Errors that did not originate from a classified source default to
/// `UnclassifiedRuntimeChange` and are recoverable.
pub fn classify(error: &anyhow::Error) -> (ErrorClassification, bool) {
    if let Some(classified) = error.downcast_ref::<ClassifiedError>() {
        return (classified.classification, classified.recoverable);
    }

    if let Some(err) = error.downcast_ref::<LeapfrogError>() {
        match err {
            LeapfrogError::DependencyResolution { .. } => {
                return (ErrorClassification::DependencyResolution, false)
            }
            LeapfrogError::UnknownHandler { .. }
            | LeapfrogError::DuplicateStep { .. }
            | LeapfrogError::ConfigValidationError { .. }
            | LeapfrogError::ConfigParseError { .. }
            | LeapfrogError::ConfigNotFound { .. } => {
                return (ErrorClassification::ConfigurationError, false)
            }
            _ => {}
        }
    }

    (ErrorClassification::UnclassifiedRuntimeChange, true)
}
