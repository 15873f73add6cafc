//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pvsnap-config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported backend type '{kind}', expected one of: {supported}")]
    UnsupportedBackend { kind: String, supported: String },

    #[error("Missing required key [{section}] {key}")]
    MissingKey { section: String, key: String },

    #[error(transparent)]
    Discovery(#[from] common::Error),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl ConfigError {
    pub fn invalid_value(
        section: &str,
        key: &str,
        value: &str,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
