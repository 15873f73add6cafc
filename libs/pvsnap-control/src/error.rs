//! Control Layer Error Types

use std::time::Duration;
use thiserror::Error;

/// Result type for pvsnap-control operations
pub type Result<T> = std::result::Result<T, ControlError>;

/// Control layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Protocol not enabled or not known
    #[error("No shim available for protocol '{0}'")]
    ShimUnavailable(String),

    /// Read or write did not finish in time
    #[error("Timed out after {timeout:?} on {address}")]
    Timeout { address: String, timeout: Duration },

    /// Channel could not be connected
    #[error("Could not connect to {0}")]
    Disconnected(String),

    /// The IOC refused the write
    #[error("Put to {address} rejected: {reason}")]
    PutRejected { address: String, reason: String },

    /// `put_many` got a different number of addresses and values
    #[error("Got {addresses} addresses but {values} values")]
    LengthMismatch { addresses: usize, values: usize },

    /// Fixture data could not be loaded
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// The background task died before reporting a result
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl ControlError {
    /// Whether the error concerns a single address rather than the layer
    pub fn is_channel_error(&self) -> bool {
        matches!(
            self,
            ControlError::Timeout { .. }
                | ControlError::Disconnected(_)
                | ControlError::PutRejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ControlError::ShimUnavailable("pva".into()).to_string(),
            "No shim available for protocol 'pva'"
        );
        assert_eq!(
            ControlError::LengthMismatch {
                addresses: 3,
                values: 2
            }
            .to_string(),
            "Got 3 addresses but 2 values"
        );
        assert!(ControlError::Disconnected("X".into()).is_channel_error());
        assert!(!ControlError::Fixture("bad".into()).is_channel_error());
    }
}
