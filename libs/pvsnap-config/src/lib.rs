//! pvsnap configuration
//!
//! Reads the INI file shared by the CLI and the client library:
//!
//! ```ini
//! [backend]
//! type = directory
//! path = ./db
//!
//! [control_layer]
//! ca = true
//! pva = false
//!
//! [meta_pvs]
//! pvs = ACCL:GUN:ENERGY, LASR:SHUTTER
//! ```
//!
//! Relative backend paths resolve against the directory holding the file.

pub mod error;
pub mod settings;

pub use error::{ConfigError, Result};
pub use settings::{
    parse_bool, split_list, BackendKind, BackendSettings, ControlLayerSettings, DemoSettings,
    ImportSettings, LoggingSettings, Settings, DEFAULT_MAX_BATCH_SIZE, KNOWN_SHIMS,
};
