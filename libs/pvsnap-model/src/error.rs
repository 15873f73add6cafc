//! Model Layer Error Types

use thiserror::Error;

/// Result type for pvsnap-model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Model layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Entry failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tag group name not present in the tag definition
    #[error("Unknown tag group: {0}")]
    UnknownTagGroup(String),

    /// Tag name not present in its group
    #[error("Unknown tag '{tag}' in group '{group}'")]
    UnknownTag { group: String, tag: String },
}

impl ModelError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ModelError::validation("empty PV").to_string(),
            "Validation error: empty PV"
        );
        assert_eq!(
            ModelError::UnknownTag {
                group: "Area".to_string(),
                tag: "IN30".to_string()
            }
            .to_string(),
            "Unknown tag 'IN30' in group 'Area'"
        );
    }
}
