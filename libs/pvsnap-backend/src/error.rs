//! Error types for pvsnap-backend

use thiserror::Error;
use uuid::Uuid;

use pvsnap_model::{ModelError, TagGroupId, TagId};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Entry already exists: {0}")]
    EntryExists(Uuid),

    #[error("Entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Stored entry {0} differs from the given copy")]
    Conflict(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Search does not support operator \"{0}\"")]
    UnsupportedOperator(String),

    #[error("Invalid search: {0}")]
    InvalidSearch(String),

    #[error("Tag group not found: {0}")]
    TagGroupNotFound(TagGroupId),

    #[error("Tag {tag} not found in group {group}")]
    TagNotFound { group: TagGroupId, tag: TagId },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Backend service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Not supported by this backend: {0}")]
    Unsupported(String),

    #[error("Backend configuration: {0}")]
    Config(#[from] pvsnap_config::ConfigError),
}

impl BackendError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Http(_) | BackendError::Io(_) => true,
            BackendError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<ModelError> for BackendError {
    fn from(err: ModelError) -> Self {
        BackendError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
