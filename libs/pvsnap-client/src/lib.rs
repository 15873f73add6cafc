//! pvsnap Client
//!
//! Ties a storage backend to the control layer: take snapshots of the live
//! machine, restore them, compare them, and bulk-import PV configurations
//! from CSV.
//!
//! # Example
//!
//! ```no_run
//! use pvsnap_client::Client;
//!
//! # async fn run() -> pvsnap_client::Result<()> {
//! let client = Client::from_config(None)?;
//! let snapshot = client.snap(None).await?;
//! client.save(pvsnap_model::Entry::Snapshot(snapshot)).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;

pub mod error;

pub mod import;

// Re-exports
pub use client::{expand_isclose, Client};
pub use error::{ClientError, Result};

pub use import::{
    build_pvs, parse_csv, CsvRow, ImportError, ImportOptions, ImportReport, ParsedCsv, RowError,
};
