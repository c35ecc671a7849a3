//! Error types for the decision task

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
///
/// Every variant is fatal: the run stops before any task is submitted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Build config (module list) not found
    #[error("Build config not found at {0}")]
    BuildConfigNotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// No module could be discovered
    #[error("Could not get module names from the build config")]
    NoModules,

    /// Release requested but no artifact is publishable
    #[error("No publishable artifact found for the release")]
    NoPublishableArtifacts,

    /// A required docker image folder is absent
    #[error("Docker image folder '{0}' not found")]
    MissingDockerImage(String),

    /// Release version is not a valid semantic version
    #[error("Invalid release version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
