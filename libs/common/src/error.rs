use std::path::PathBuf;
use thiserror::Error;

/// Basic library error type
#[derive(Debug, Error)]
pub enum Error {
    /// No configuration file in any of the searched locations
    #[error("No configuration file found, searched: {}", format_paths(.0))]
    ConfigNotFound(Vec<PathBuf>),

    /// Path could not be expanded (unknown variable, no home directory)
    #[error("Cannot expand path '{path}': {reason}")]
    PathExpansion { path: String, reason: String },

    /// Logging setup failed
    #[error("Logging error: {0}")]
    Logging(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error result type
pub type Result<T> = std::result::Result<T, Error>;
