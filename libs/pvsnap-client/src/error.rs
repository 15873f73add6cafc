//! Client Error Types

use thiserror::Error;
use uuid::Uuid;

use pvsnap_backend::BackendError;
use pvsnap_config::ConfigError;
use pvsnap_control::ControlError;

use crate::import::ImportError;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Import(#[from] ImportError),

    /// A client-side search operator got a value it cannot use
    #[error("Invalid search: {0}")]
    InvalidSearch(String),

    #[error("Entry {0} is not a snapshot")]
    NotASnapshot(Uuid),
}
