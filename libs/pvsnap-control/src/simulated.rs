//! In-process IOC
//!
//! Holds channel values in memory and serves them through the `Shim`
//! interface. Used by the test suites and by the deprecated demo mode, which
//! seeds it from JSON fixture files of the form `{"ADDRESS": value, ...}`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pvsnap_model::{EpicsData, EpicsValue, Severity, Status};

use crate::error::{ControlError, Result};
use crate::shim::Shim;

const MONITOR_BUFFER: usize = 32;

/// Simulated IOC serving every protocol from one set of channels
#[derive(Default)]
pub struct SimulatedShim {
    channels: DashMap<String, EpicsData>,
    monitors: DashMap<String, Vec<mpsc::Sender<EpicsData>>>,
    read_only: DashSet<String>,
    latency: Option<Duration>,
}

impl SimulatedShim {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every get and put, to exercise timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Create or replace a channel
    pub fn insert(&self, address: impl Into<String>, data: EpicsData) {
        self.channels.insert(address.into(), data);
    }

    /// Create or replace a channel holding `value` with no alarm
    pub fn set_value(&self, address: impl Into<String>, value: impl Into<EpicsValue>) {
        self.insert(address, EpicsData::new(value));
    }

    /// Refuse puts to `address`
    pub fn set_read_only(&self, address: impl Into<String>) {
        self.read_only.insert(address.into());
    }

    /// Current value of a channel, bypassing latency
    pub fn value(&self, address: &str) -> Option<EpicsValue> {
        self.channels.get(address).and_then(|d| d.data.clone())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Load channels from a JSON object fixture; returns how many were loaded
    pub fn load_fixture(&self, path: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ControlError::Fixture(format!("{}: {}", path.display(), e)))?;
        let values: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)
            .map_err(|e| ControlError::Fixture(format!("{}: {}", path.display(), e)))?;

        let mut loaded = 0;
        for (address, raw) in values {
            match serde_json::from_value::<EpicsValue>(raw) {
                Ok(value) => {
                    self.set_value(address, value);
                    loaded += 1;
                },
                Err(e) => warn!("Skipping fixture value for {}: {}", address, e),
            }
        }
        info!("Loaded {} simulated channels from {}", loaded, path.display());
        Ok(loaded)
    }

    /// Simulated IOC seeded from several fixture files, later files winning
    pub fn from_fixtures<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let shim = Self::new();
        for path in paths {
            shim.load_fixture(path.as_ref())?;
        }
        Ok(shim)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn notify(&self, address: &str, data: &EpicsData) {
        if let Some(mut senders) = self.monitors.get_mut(address) {
            senders.retain(|tx| match tx.try_send(data.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Monitor on {} is lagging, update dropped", address);
                    true
                },
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
    }
}

#[async_trait]
impl Shim for SimulatedShim {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn get(&self, address: &str) -> Result<EpicsData> {
        self.delay().await;
        self.channels
            .get(address)
            .map(|d| d.clone())
            .ok_or_else(|| ControlError::Disconnected(address.to_string()))
    }

    async fn put(&self, address: &str, value: EpicsValue) -> Result<()> {
        self.delay().await;
        if self.read_only.contains(address) {
            return Err(ControlError::PutRejected {
                address: address.to_string(),
                reason: "channel is read-only".to_string(),
            });
        }
        let updated = {
            let mut channel = self
                .channels
                .get_mut(address)
                .ok_or_else(|| ControlError::Disconnected(address.to_string()))?;
            channel.data = Some(value);
            channel.status = Status::NoAlarm;
            channel.severity = Severity::NoAlarm;
            channel.timestamp = pvsnap_model::utcnow();
            channel.clone()
        };
        self.notify(address, &updated);
        Ok(())
    }

    async fn monitor(&self, address: &str) -> Result<mpsc::Receiver<EpicsData>> {
        let current = self
            .channels
            .get(address)
            .map(|d| d.clone())
            .ok_or_else(|| ControlError::Disconnected(address.to_string()))?;
        let (tx, rx) = mpsc::channel(MONITOR_BUFFER);
        // capacity is at least one, the first send cannot fail
        let _ = tx.try_send(current);
        self.monitors.entry(address.to_string()).or_default().push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_get_put() {
        let ioc = SimulatedShim::new();
        ioc.set_value("SP:1", 1.0);
        assert_eq!(ioc.get("SP:1").await.unwrap().data, Some(EpicsValue::Float(1.0)));

        ioc.put("SP:1", EpicsValue::Float(2.5)).await.unwrap();
        assert_eq!(ioc.value("SP:1"), Some(EpicsValue::Float(2.5)));

        assert_eq!(
            ioc.get("MISSING").await.unwrap_err(),
            ControlError::Disconnected("MISSING".into())
        );
        assert!(ioc.put("MISSING", EpicsValue::Int(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_read_only_rejects_put() {
        let ioc = SimulatedShim::new();
        ioc.set_value("RB:1", 4i64);
        ioc.set_read_only("RB:1");
        assert!(matches!(
            ioc.put("RB:1", EpicsValue::Int(5)).await,
            Err(ControlError::PutRejected { .. })
        ));
        assert_eq!(ioc.value("RB:1"), Some(EpicsValue::Int(4)));
    }

    #[tokio::test]
    async fn test_monitor_receives_updates() {
        let ioc = SimulatedShim::new();
        ioc.set_value("SP:1", 0i64);
        let mut rx = ioc.monitor("SP:1").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().data, Some(EpicsValue::Int(0)));

        ioc.put("SP:1", EpicsValue::Int(7)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().data, Some(EpicsValue::Int(7)));

        // closed monitors are pruned on the next update
        drop(rx);
        ioc.put("SP:1", EpicsValue::Int(8)).await.unwrap();
        assert!(ioc.monitors.get("SP:1").unwrap().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_load_fixture() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"LASR:GUNB:POWER": 12.5, "MODE": "AUTO", "WAVE": [1, 2, 3], "BAD": {{"x": 1}}}}"#
        )
        .unwrap();

        let ioc = SimulatedShim::from_fixtures(&[file.path()]).unwrap();
        assert_eq!(ioc.len(), 3);
        assert_eq!(ioc.value("MODE"), Some(EpicsValue::Str("AUTO".into())));
        assert_eq!(ioc.value("WAVE"), Some(EpicsValue::IntArray(vec![1, 2, 3])));
        assert!(logs_contain("Skipping fixture value for BAD"));

        assert!(matches!(
            SimulatedShim::from_fixtures(&["/nonexistent/fixture.json"]),
            Err(ControlError::Fixture(_))
        ));
    }
}
