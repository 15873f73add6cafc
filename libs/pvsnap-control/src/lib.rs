//! pvsnap Control Layer
//!
//! Reads, writes and monitors live PVs through protocol shims.
//!
//! # Key Components
//!
//! - **Shim trait**: one implementation per protocol
//! - **ControlLayer**: routes `ca://` / `pva://` addresses to the right shim
//! - **TaskStatus**: completion handle for background puts
//! - **SimulatedShim**: in-process IOC for tests and demo mode

pub mod error;

pub mod shim;

pub mod status;

pub mod layer;

pub mod simulated;

// Re-exports
pub use error::{ControlError, Result};
pub use shim::Shim;

pub use status::TaskStatus;

pub use layer::{split_protocol, ControlLayer, DEFAULT_PROTOCOL, DEFAULT_TIMEOUT};

pub use simulated::SimulatedShim;
