//! pvsnap basic library
//!
//! Provides functions shared by the pvsnap crates and the CLI:
//! - logging bootstrap
//! - path expansion and configuration file discovery

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
pub use paths::{build_abs_path, find_config, CONFIG_ENV_VAR};
