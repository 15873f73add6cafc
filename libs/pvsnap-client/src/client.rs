//! Client facade over a backend and a control layer

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use pvsnap_backend::{open_backend, Backend, SearchOp, SearchTerm, SearchValue};
use pvsnap_config::{Settings, DEFAULT_MAX_BATCH_SIZE};
use pvsnap_control::{ControlLayer, Shim, SimulatedShim, TaskStatus};
use pvsnap_model::{
    compare_snapshots, ComparisonRow, EpicsData, EpicsValue, Entry, Pv, Snapshot,
};

use crate::error::{ClientError, Result};

/// Entry point for reading, storing and restoring PV data
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    control: ControlLayer,
    meta_addresses: Vec<String>,
    max_batch_size: usize,
}

impl Client {
    pub fn new(backend: Arc<dyn Backend>, control: ControlLayer) -> Self {
        Self {
            backend,
            control,
            meta_addresses: Vec::new(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    /// Extra read-only addresses recorded with every snapshot
    pub fn with_meta_pvs(mut self, addresses: Vec<String>) -> Self {
        self.meta_addresses = addresses;
        self
    }

    pub fn with_max_batch_size(mut self, limit: usize) -> Self {
        self.max_batch_size = limit;
        self
    }

    /// Build a client from loaded settings, serving enabled protocols with `shim`
    pub fn from_settings(settings: &Settings, shim: Arc<dyn Shim>) -> Result<Self> {
        let backend = open_backend(&settings.backend)?;
        let control = ControlLayer::from_settings(&settings.control_layer, shim);
        Ok(Self::new(backend, control)
            .with_meta_pvs(settings.meta_pvs.clone())
            .with_max_batch_size(settings.import.max_batch_size))
    }

    /// Build a client from a config file, or the discovered one when `path` is `None`
    pub fn from_config(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Settings::load(path)?,
            None => Settings::discover()?,
        };
        Self::open(&settings)
    }

    /// Build a client from loaded settings with the simulated IOC
    ///
    /// The IOC is seeded from the demo fixtures when the settings list any.
    pub fn open(settings: &Settings) -> Result<Self> {
        let shim = match &settings.demo {
            Some(demo) => {
                warn!("Demo mode is deprecated; using simulated channels");
                SimulatedShim::from_fixtures(&demo.fixtures)?
            },
            None => {
                info!("No live protocol client available; using an empty simulated IOC");
                SimulatedShim::new()
            },
        };
        Self::from_settings(settings, Arc::new(shim))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn control(&self) -> &ControlLayer {
        &self.control
    }

    pub fn meta_addresses(&self) -> &[String] {
        &self.meta_addresses
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    // ========== Entries ==========

    /// Entries matching every term
    ///
    /// `isclose` terms take `(target, rel_tol, abs_tol)` and are turned into
    /// an inclusive `gt`/`lt` range before reaching the backend.
    pub async fn search(&self, terms: Vec<SearchTerm>) -> Result<Vec<Entry>> {
        let terms = expand_isclose(terms)?;
        Ok(self.backend.search(&terms).await?)
    }

    pub async fn save(&self, entry: Entry) -> Result<()> {
        entry.validate().map_err(pvsnap_backend::BackendError::from)?;
        Ok(self.backend.save_entry(entry).await?)
    }

    pub async fn delete(&self, entry: &Entry) -> Result<()> {
        Ok(self.backend.delete_entry(entry).await?)
    }

    /// Stored snapshot by id
    pub async fn snapshot(&self, id: Uuid) -> Result<Snapshot> {
        match self.backend.get_entry(id).await? {
            Entry::Snapshot(snapshot) => Ok(snapshot),
            Entry::Pv(_) => Err(ClientError::NotASnapshot(id)),
        }
    }

    // ========== Live data ==========

    /// Read every current PV and meta PV into a snapshot
    ///
    /// Fills `dest` when given. Unreadable channels get empty data rather
    /// than failing the snapshot. The snapshot is not stored.
    pub async fn snap(&self, dest: Option<Snapshot>) -> Result<Snapshot> {
        debug!("Taking snapshot");
        let pvs = self.backend.get_all_pvs().await?;
        let mut meta = self.backend.get_meta_pvs().await?;
        for address in &self.meta_addresses {
            if !meta.iter().any(|pv| pv.addresses().contains(&address.as_str())) {
                meta.push(Pv::new("", address.clone()));
            }
        }

        let addresses: Vec<String> = pvs
            .iter()
            .chain(meta.iter())
            .flat_map(|pv| pv.addresses())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let results = self.control.get(&addresses).await;

        let mut failed = 0;
        let data: HashMap<&str, EpicsData> = addresses
            .iter()
            .zip(results)
            .map(|(address, result)| {
                let value = result.unwrap_or_else(|e| {
                    debug!("Read of {} failed: {}", address, e);
                    failed += 1;
                    EpicsData::default()
                });
                (address.as_str(), value)
            })
            .collect();
        if failed > 0 {
            warn!("{} of {} channels could not be read", failed, addresses.len());
        }

        let fill = |pv: &Pv| {
            let mut copy = pv.clone();
            if let Some(value) = data.get(pv.setpoint.as_str()) {
                copy.setpoint_data = value.clone();
            }
            if let Some(value) = data.get(pv.readback.as_str()) {
                copy.readback_data = value.clone();
            }
            copy
        };

        let mut snapshot = dest.unwrap_or_else(|| Snapshot::new(""));
        snapshot.pvs.extend(pvs.iter().map(fill));
        snapshot.meta_pvs.extend(meta.iter().map(fill));
        info!(
            "Snapshot holds {} PVs and {} meta PVs",
            snapshot.pvs.len(),
            snapshot.meta_pvs.len()
        );
        Ok(snapshot)
    }

    /// Write the saved setpoints of `entry` back to the machine
    ///
    /// PVs without a setpoint address or saved setpoint value are skipped.
    /// Puts run concurrently unless `sequential` is set, in which case each
    /// is awaited and the sequence stops at the first failure; the failed
    /// put is the last status returned.
    pub async fn apply(&self, entry: &Entry, sequential: bool) -> Result<Vec<TaskStatus>> {
        let targets: Vec<(&str, EpicsValue)> = match entry {
            Entry::Pv(pv) => setpoint_target(pv).into_iter().collect(),
            Entry::Snapshot(snapshot) => snapshot.pvs.iter().filter_map(setpoint_target).collect(),
        };
        if targets.is_empty() {
            warn!("Nothing to apply from {}", entry.uuid());
            return Ok(Vec::new());
        }

        if !sequential {
            let (addresses, values): (Vec<&str>, Vec<EpicsValue>) = targets.into_iter().unzip();
            return Ok(self.control.put_many(&addresses, values)?);
        }

        let mut statuses = Vec::with_capacity(targets.len());
        for (address, value) in targets {
            let status = match self.control.put(address, value) {
                Ok(status) => status,
                Err(e) => TaskStatus::completed(address, Err(e)),
            };
            let outcome = status.wait(None).await;
            statuses.push(status);
            if let Err(e) = outcome {
                warn!("Put to {} failed ({}), stopping sequence", address, e);
                break;
            }
        }
        Ok(statuses)
    }

    /// Compare two stored snapshots, `main` being the reference
    pub async fn compare(&self, main: Uuid, other: Uuid) -> Result<Vec<ComparisonRow>> {
        let main = self.snapshot(main).await?;
        let other = self.snapshot(other).await?;
        Ok(compare_snapshots(&main, &other))
    }
}

fn setpoint_target(pv: &Pv) -> Option<(&str, EpicsValue)> {
    if pv.setpoint.is_empty() {
        return None;
    }
    pv.setpoint_data
        .data
        .clone()
        .map(|value| (pv.setpoint.as_str(), value))
}

fn as_number(value: &SearchValue) -> Option<f64> {
    match value {
        SearchValue::Int(i) => Some(*i as f64),
        SearchValue::Float(f) => Some(*f),
        _ => None,
    }
}

/// Replace `isclose` terms by the equivalent `gt` + `lt` pair
///
/// The band is `target ± (|target| * rel_tol + abs_tol)`.
pub fn expand_isclose(terms: Vec<SearchTerm>) -> Result<Vec<SearchTerm>> {
    let mut expanded = Vec::with_capacity(terms.len());
    for term in terms {
        if term.op != SearchOp::IsClose {
            expanded.push(term);
            continue;
        }
        let numbers: Option<Vec<f64>> = match &term.value {
            SearchValue::List(items) if items.len() == 3 => items.iter().map(as_number).collect(),
            _ => None,
        };
        let (target, rel_tol, abs_tol) = match numbers.as_deref() {
            Some(&[target, rel_tol, abs_tol]) => (target, rel_tol, abs_tol),
            _ => {
                return Err(ClientError::InvalidSearch(format!(
                    "isclose on '{}' needs (target, rel_tol, abs_tol), got {:?}",
                    term.attr, term.value
                )))
            },
        };
        let margin = target.abs() * rel_tol + abs_tol;
        expanded.push(SearchTerm::new(
            term.attr.clone(),
            SearchOp::Gt,
            target - margin,
        ));
        expanded.push(SearchTerm::new(term.attr, SearchOp::Lt, target + margin));
    }
    Ok(expanded)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use pvsnap_backend::MemoryBackend;
    use tracing_test::traced_test;

    #[test]
    fn test_expand_isclose() {
        let terms = vec![
            SearchTerm::new("description", SearchOp::Like, "laser"),
            SearchTerm::new(
                "setpoint_data.data",
                SearchOp::IsClose,
                SearchValue::List(vec![
                    SearchValue::Float(10.0),
                    SearchValue::Float(0.1),
                    SearchValue::Int(1),
                ]),
            ),
        ];
        let expanded = expand_isclose(terms).unwrap();
        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[0].op, SearchOp::Like);
        assert_eq!(expanded[1].op, SearchOp::Gt);
        assert_eq!(expanded[1].value, SearchValue::Float(8.0));
        assert_eq!(expanded[2].op, SearchOp::Lt);
        assert_eq!(expanded[2].value, SearchValue::Float(12.0));
    }

    #[test]
    fn test_expand_isclose_negative_target() {
        let term = SearchTerm::parse("setpoint_data.data isclose (-10, 0.5, 0)").unwrap();
        let expanded = expand_isclose(vec![term]).unwrap();
        assert_eq!(expanded[0].value, SearchValue::Float(-15.0));
        assert_eq!(expanded[1].value, SearchValue::Float(-5.0));
    }

    #[test]
    fn test_expand_isclose_rejects_bad_values() {
        for raw in ["5", "(1, 2)", "(a, 0.1, 0)"] {
            let term = SearchTerm::parse(&format!("setpoint_data.data isclose {}", raw)).unwrap();
            assert!(matches!(
                expand_isclose(vec![term]),
                Err(ClientError::InvalidSearch(_))
            ));
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_snap_warns_about_unread_channels() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .save_entry(Entry::Pv(Pv::new("SP:1", "RB:1")))
            .await
            .unwrap();
        let ioc = Arc::new(SimulatedShim::new());
        ioc.set_value("SP:1", 2.0);
        let client = Client::new(backend, ControlLayer::new().with_shim("ca", ioc));

        let snapshot = client.snap(None).await.unwrap();
        assert!(snapshot.pvs[0].setpoint_data.has_value());
        assert!(!snapshot.pvs[0].readback_data.has_value());
        assert!(logs_contain("1 of 2 channels could not be read"));
    }
}
