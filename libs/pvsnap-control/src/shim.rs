//! Protocol shim trait

use async_trait::async_trait;
use tokio::sync::mpsc;

use pvsnap_model::{EpicsData, EpicsValue};

use crate::error::Result;

/// One control-system protocol (Channel Access, PVAccess, ...)
///
/// Addresses handed to a shim have their `proto://` prefix removed.
#[async_trait]
pub trait Shim: Send + Sync + 'static {
    /// Implementation name, for logs
    fn name(&self) -> &str;

    /// Read the current value and alarm state of `address`
    async fn get(&self, address: &str) -> Result<EpicsData>;

    /// Write `value` to `address`, returning once the write is confirmed
    async fn put(&self, address: &str, value: EpicsValue) -> Result<()>;

    /// Updates for `address`, starting with its current value
    ///
    /// The stream ends when the receiver is dropped or the channel goes away.
    async fn monitor(&self, address: &str) -> Result<mpsc::Receiver<EpicsData>>;
}
