//! pvsnap Storage Backends
//!
//! Provides a unified interface for PV configuration and snapshot storage,
//! supporting multiple backends (in-memory, local directory, REST service).
//!
//! # Key Components
//!
//! - **Backend trait**: entry, tag, PV, snapshot and meta PV operations
//! - **SearchTerm**: `attr op value` filters evaluated against entries
//! - **open_backend**: construct the backend named by the configuration

pub mod traits;

pub mod memory_impl;

pub mod directory_impl;

pub mod http_impl;

pub mod catalog;

pub mod error;

pub mod search;

use std::sync::Arc;

use tracing::info;

use pvsnap_config::{BackendKind, BackendSettings};

// Re-exports
pub use error::{BackendError, Result};
pub use traits::{Backend, SnapshotFilter};

pub use search::{SearchOp, SearchTerm, SearchValue};

pub use memory_impl::{MemoryBackend, MemoryStats};

pub use directory_impl::DirectoryBackend;

pub use http_impl::HttpBackend;

/// Build the backend selected by `settings`
///
/// `directory` and `mongo` need a `path`; for `directory` it is expected to
/// be absolute already (the config loader resolves it).
pub fn open_backend(settings: &BackendSettings) -> Result<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match settings.kind {
        BackendKind::Test => Arc::new(MemoryBackend::new()),
        BackendKind::Directory => Arc::new(DirectoryBackend::new(settings.require_path()?)?),
        BackendKind::Mongo => Arc::new(HttpBackend::new(settings.require_path()?)?),
    };
    info!(
        "Opened {} backend{}",
        backend.name(),
        settings
            .path
            .as_deref()
            .map(|p| format!(" at {}", p))
            .unwrap_or_default()
    );
    Ok(backend)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_open_backend_kinds() {
        let backend = open_backend(&BackendSettings::default()).unwrap();
        assert_eq!(backend.name(), "test");

        let missing = BackendSettings::new(BackendKind::Directory, None);
        assert!(matches!(
            open_backend(&missing),
            Err(BackendError::Config(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let settings = BackendSettings::new(
            BackendKind::Directory,
            Some(dir.path().display().to_string()),
        );
        assert_eq!(open_backend(&settings).unwrap().name(), "directory");

        let settings =
            BackendSettings::new(BackendKind::Mongo, Some("http://localhost:8080".into()));
        assert_eq!(open_backend(&settings).unwrap().name(), "mongo");
    }
}
