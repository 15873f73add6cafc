//! Tolerance-aware value comparison
//!
//! Closeness follows numpy's `isclose`: `|a - b| <= abs_tol + rel_tol * |b|`,
//! with `b` being the reference value.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::entry::{Pv, Snapshot};
use crate::types::{EpicsData, EpicsValue, Severity};

pub const DEFAULT_REL_TOLERANCE: f64 = 1e-5;
pub const DEFAULT_ABS_TOLERANCE: f64 = 1e-8;

fn close_f64(a: f64, b: f64, abs_tol: f64, rel_tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a == b {
        // covers matching infinities
        return true;
    }
    (a - b).abs() <= abs_tol + rel_tol * b.abs()
}

/// Whether two values are equal within tolerance
///
/// Numbers are compared with tolerances (ints and floats mix freely), arrays
/// element-wise and only when their lengths match, anything else by equality.
pub fn is_close(
    a: &EpicsValue,
    b: &EpicsValue,
    abs_tol: Option<f64>,
    rel_tol: Option<f64>,
) -> bool {
    let abs_tol = abs_tol.unwrap_or(DEFAULT_ABS_TOLERANCE);
    let rel_tol = rel_tol.unwrap_or(DEFAULT_REL_TOLERANCE);

    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return close_f64(x, y, abs_tol, rel_tol);
    }
    if let (Some(xs), Some(ys)) = (a.as_f64_array(), b.as_f64_array()) {
        return xs.len() == ys.len()
            && xs
                .iter()
                .zip(ys.iter())
                .all(|(x, y)| close_f64(*x, *y, abs_tol, rel_tol));
    }
    a == b
}

/// Compare two reads of the same channel
///
/// Enum channels compare by their enum strings, so a saved index still
/// matches after the enum order changes. Missing data only matches missing
/// data.
pub fn data_is_close(
    a: &EpicsData,
    b: &EpicsData,
    abs_tol: Option<f64>,
    rel_tol: Option<f64>,
) -> bool {
    if let (Some(x), Some(y)) = (a.enum_string(), b.enum_string()) {
        return x == y;
    }
    match (&a.data, &b.data) {
        (Some(x), Some(y)) => is_close(x, y, abs_tol, rel_tol),
        (None, None) => true,
        _ => false,
    }
}

/// One line of a snapshot comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub setpoint: String,
    pub readback: String,
    pub description: String,
    pub main_setpoint: Option<EpicsValue>,
    pub other_setpoint: Option<EpicsValue>,
    pub main_readback: Option<EpicsValue>,
    pub other_readback: Option<EpicsValue>,
    pub main_severity: Option<Severity>,
    pub other_severity: Option<Severity>,
    pub setpoint_close: bool,
    pub readback_close: bool,
}

impl ComparisonRow {
    /// Whether the PV was found in both snapshots with matching values
    pub fn is_match(&self) -> bool {
        self.setpoint_close && self.readback_close
    }

    pub fn address(&self) -> &str {
        if self.setpoint.is_empty() {
            &self.readback
        } else {
            &self.setpoint
        }
    }
}

fn display_value(data: &EpicsData) -> Option<EpicsValue> {
    match data.enum_string() {
        Some(name) => Some(EpicsValue::Str(name.to_string())),
        None => data.data.clone(),
    }
}

fn build_row(main: Option<&Pv>, other: Option<&Pv>) -> ComparisonRow {
    // tolerances come from the main side when present
    let reference = main.or(other);
    let (abs_tol, rel_tol) = reference
        .map(|pv| (pv.abs_tolerance, pv.rel_tolerance))
        .unwrap_or((None, None));

    let (setpoint_close, readback_close) = match (main, other) {
        (Some(m), Some(o)) => (
            data_is_close(&m.setpoint_data, &o.setpoint_data, abs_tol, rel_tol),
            data_is_close(&m.readback_data, &o.readback_data, abs_tol, rel_tol),
        ),
        _ => (false, false),
    };

    ComparisonRow {
        setpoint: reference.map(|pv| pv.setpoint.clone()).unwrap_or_default(),
        readback: reference.map(|pv| pv.readback.clone()).unwrap_or_default(),
        description: reference
            .map(|pv| pv.description.clone())
            .unwrap_or_default(),
        main_setpoint: main.and_then(|pv| display_value(&pv.setpoint_data)),
        other_setpoint: other.and_then(|pv| display_value(&pv.setpoint_data)),
        main_readback: main.and_then(|pv| display_value(&pv.readback_data)),
        other_readback: other.and_then(|pv| display_value(&pv.readback_data)),
        main_severity: main.map(|pv| pv.setpoint_data.severity),
        other_severity: other.map(|pv| pv.setpoint_data.severity),
        setpoint_close,
        readback_close,
    }
}

fn find_match<'a>(snapshot: &'a Snapshot, pv: &Pv) -> Option<&'a Pv> {
    if !pv.setpoint.is_empty() {
        if let Some(found) = snapshot.pvs.iter().find(|p| p.setpoint == pv.setpoint) {
            return Some(found);
        }
    }
    if !pv.readback.is_empty() {
        return snapshot.pvs.iter().find(|p| p.readback == pv.readback);
    }
    None
}

/// Compare every PV of `main` against `other`
///
/// Rows follow the order of `main`, followed by PVs only present in `other`.
pub fn compare_snapshots(main: &Snapshot, other: &Snapshot) -> Vec<ComparisonRow> {
    let mut rows = Vec::with_capacity(main.pvs.len());
    let mut matched: BTreeSet<uuid::Uuid> = BTreeSet::new();

    for pv in &main.pvs {
        let counterpart = find_match(other, pv);
        if let Some(found) = counterpart {
            matched.insert(found.uuid);
        }
        rows.push(build_row(Some(pv), counterpart));
    }

    for pv in other.pvs.iter().filter(|pv| !matched.contains(&pv.uuid)) {
        rows.push(build_row(None, Some(pv)));
    }

    rows
}
