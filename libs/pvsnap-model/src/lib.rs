//! pvsnap Model Library
//!
//! Core data types shared by every pvsnap crate: process variables,
//! snapshots, tag definitions and the value comparison used when
//! checking saved data against live or other saved data.
//!
//! # Modules
//!
//! - `types`: EPICS value containers and alarm enums
//! - `entry`: `Pv`, `Snapshot` and the `Entry` union stored by backends
//! - `tags`: tag groups, tag sets and name resolution
//! - `compare`: tolerance-aware value closeness and snapshot comparison
//! - `error`: model layer errors
//!
//! # Example
//!
//! ```
//! use pvsnap_model::{compare::is_close, EpicsValue};
//!
//! let saved = EpicsValue::Float(10.0);
//! let live = EpicsValue::Float(10.4);
//! assert!(is_close(&saved, &live, Some(0.5), None));
//! assert!(!is_close(&saved, &live, None, None));
//! ```

pub mod compare;
pub mod entry;
pub mod error;
pub mod tags;
pub mod types;

// Re-exports for convenience
pub use compare::{compare_snapshots, ComparisonRow};
pub use entry::{AttrValue, Entry, EntryKind, NewPv, Pv, PvUpdate, Snapshot};
pub use error::{ModelError, Result};
pub use tags::{TagDef, TagGroup, TagGroupId, TagId, TagSet};
pub use types::{EpicsData, EpicsValue, Severity, Status};

/// Current UTC time, used as the default creation timestamp
pub fn utcnow() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
