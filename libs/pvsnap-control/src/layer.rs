//! Protocol dispatch
//!
//! Addresses may be written `ca://NAME` or `pva://NAME`; bare names go to the
//! default protocol. Each protocol is served by one `Shim`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pvsnap_config::ControlLayerSettings;
use pvsnap_model::{EpicsData, EpicsValue};

use crate::error::{ControlError, Result};
use crate::shim::Shim;
use crate::status::TaskStatus;

/// Protocol used for addresses without a prefix
pub const DEFAULT_PROTOCOL: &str = "ca";

/// Per-operation timeout for gets and puts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Split `proto://name` into protocol and bare name
pub fn split_protocol(address: &str) -> (Option<&str>, &str) {
    match address.split_once("://") {
        Some((proto, name)) => (Some(proto), name),
        None => (None, address),
    }
}

/// Dispatches reads, writes and monitors to protocol shims
#[derive(Clone)]
pub struct ControlLayer {
    shims: BTreeMap<String, Arc<dyn Shim>>,
    timeout: Duration,
}

impl Default for ControlLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlLayer {
    /// Layer with no shims; every operation fails with `ShimUnavailable`
    pub fn new() -> Self {
        Self {
            shims: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_shim(mut self, protocol: impl Into<String>, shim: Arc<dyn Shim>) -> Self {
        self.shims.insert(protocol.into(), shim);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register `shim` under every protocol enabled in `settings`
    pub fn from_settings(settings: &ControlLayerSettings, shim: Arc<dyn Shim>) -> Self {
        let enabled = settings.enabled();
        if enabled.is_empty() {
            warn!("No control layer protocols enabled");
        }
        enabled
            .into_iter()
            .fold(Self::new(), |layer, proto| layer.with_shim(proto, shim.clone()))
    }

    /// Enabled protocol names
    pub fn protocols(&self) -> Vec<&str> {
        self.shims.keys().map(String::as_str).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn resolve<'a>(&self, address: &'a str) -> Result<(Arc<dyn Shim>, &'a str)> {
        let (proto, name) = split_protocol(address);
        let proto = proto.unwrap_or(DEFAULT_PROTOCOL);
        self.shims
            .get(proto)
            .map(|shim| (shim.clone(), name))
            .ok_or_else(|| ControlError::ShimUnavailable(proto.to_string()))
    }

    /// Read one address
    pub async fn get_one(&self, address: &str) -> Result<EpicsData> {
        let (shim, name) = self.resolve(address)?;
        match tokio::time::timeout(self.timeout, shim.get(name)).await {
            Ok(result) => result,
            Err(_) => Err(ControlError::Timeout {
                address: address.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    /// Read all `addresses` concurrently
    ///
    /// Returns one result per address, in the same order.
    pub async fn get<S: AsRef<str>>(&self, addresses: &[S]) -> Vec<Result<EpicsData>> {
        debug!("Reading {} addresses", addresses.len());
        join_all(addresses.iter().map(|a| self.get_one(a.as_ref()))).await
    }

    /// Start a write of `value` to `address`
    ///
    /// Protocol errors are reported immediately; channel errors through the
    /// returned status.
    pub fn put(&self, address: &str, value: EpicsValue) -> Result<TaskStatus> {
        let (shim, name) = self.resolve(address)?;
        let name = name.to_string();
        let label = address.to_string();
        let timeout = self.timeout;
        debug!("Putting {} = {}", address, value);
        Ok(TaskStatus::spawn(address, async move {
            match tokio::time::timeout(timeout, shim.put(&name, value)).await {
                Ok(result) => result,
                Err(_) => Err(ControlError::Timeout {
                    address: label,
                    timeout,
                }),
            }
        }))
    }

    /// Start writes for matching pairs of addresses and values
    pub fn put_many<S: AsRef<str>>(
        &self,
        addresses: &[S],
        values: Vec<EpicsValue>,
    ) -> Result<Vec<TaskStatus>> {
        if addresses.len() != values.len() {
            return Err(ControlError::LengthMismatch {
                addresses: addresses.len(),
                values: values.len(),
            });
        }
        // resolve everything first so nothing is written on a bad protocol
        for address in addresses {
            self.resolve(address.as_ref())?;
        }
        addresses
            .iter()
            .zip(values)
            .map(|(address, value)| self.put(address.as_ref(), value))
            .collect()
    }

    /// Subscribe to updates of `address`
    pub async fn monitor(&self, address: &str) -> Result<mpsc::Receiver<EpicsData>> {
        let (shim, name) = self.resolve(address)?;
        shim.monitor(name).await
    }
}
