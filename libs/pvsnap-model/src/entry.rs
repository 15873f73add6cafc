//! PVs, snapshots and the entry union stored by backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, Result};
use crate::tags::TagSet;
use crate::types::{EpicsData, EpicsValue};

// ============================================================================
// PV
// ============================================================================

/// A configured process variable: setpoint/readback/config addresses plus
/// the data last read for each of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pv {
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub setpoint: String,
    #[serde(default)]
    pub readback: String,
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub setpoint_data: EpicsData,
    #[serde(default)]
    pub readback_data: EpicsData,
    #[serde(default)]
    pub config_data: EpicsData,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub abs_tolerance: Option<f64>,
    #[serde(default)]
    pub rel_tolerance: Option<f64>,
    #[serde(default = "crate::utcnow")]
    pub creation_time: DateTime<Utc>,
}

impl Default for Pv {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: String::new(),
            setpoint: String::new(),
            readback: String::new(),
            config: String::new(),
            setpoint_data: EpicsData::default(),
            readback_data: EpicsData::default(),
            config_data: EpicsData::default(),
            device: String::new(),
            tags: TagSet::new(),
            abs_tolerance: None,
            rel_tolerance: None,
            creation_time: crate::utcnow(),
        }
    }
}

impl Pv {
    /// PV with the given setpoint and readback addresses
    pub fn new(setpoint: impl Into<String>, readback: impl Into<String>) -> Self {
        Self {
            setpoint: setpoint.into(),
            readback: readback.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_setpoint_data(mut self, data: EpicsData) -> Self {
        self.setpoint_data = data;
        self
    }

    pub fn with_readback_data(mut self, data: EpicsData) -> Self {
        self.readback_data = data;
        self
    }

    /// A PV needs at least one of setpoint or readback
    pub fn validate(&self) -> Result<()> {
        if self.setpoint.trim().is_empty() && self.readback.trim().is_empty() {
            return Err(ModelError::validation(format!(
                "PV {} has neither a setpoint nor a readback address",
                self.uuid
            )));
        }
        if let Some(tol) = self.abs_tolerance {
            if tol < 0.0 || tol.is_nan() {
                return Err(ModelError::validation(format!(
                    "absolute tolerance must be non-negative, got {}",
                    tol
                )));
            }
        }
        if let Some(tol) = self.rel_tolerance {
            if tol < 0.0 || tol.is_nan() {
                return Err(ModelError::validation(format!(
                    "relative tolerance must be non-negative, got {}",
                    tol
                )));
            }
        }
        Ok(())
    }

    /// Non-empty setpoint and readback addresses, in that order
    pub fn addresses(&self) -> Vec<&str> {
        [self.setpoint.as_str(), self.readback.as_str()]
            .into_iter()
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// Address used to identify this PV in listings
    pub fn display_address(&self) -> &str {
        if self.setpoint.is_empty() {
            &self.readback
        } else {
            &self.setpoint
        }
    }
}

/// Fields for creating a PV through a backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPv {
    pub setpoint: String,
    pub readback: String,
    pub description: String,
    pub device: String,
    pub tags: TagSet,
    pub abs_tolerance: Option<f64>,
    pub rel_tolerance: Option<f64>,
    pub config: String,
}

impl NewPv {
    pub fn new(setpoint: impl Into<String>, readback: impl Into<String>) -> Self {
        Self {
            setpoint: setpoint.into(),
            readback: readback.into(),
            ..Self::default()
        }
    }

    /// Build the PV this request describes, with a fresh id and timestamp
    pub fn into_pv(self) -> Pv {
        Pv {
            setpoint: self.setpoint,
            readback: self.readback,
            config: self.config,
            description: self.description,
            device: self.device,
            tags: self.tags,
            abs_tolerance: self.abs_tolerance,
            rel_tolerance: self.rel_tolerance,
            ..Pv::default()
        }
    }
}

/// Partial update of a PV; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PvUpdate {
    pub setpoint: Option<String>,
    pub description: Option<String>,
    pub device: Option<String>,
    pub tags: Option<TagSet>,
    pub abs_tolerance: Option<f64>,
    pub rel_tolerance: Option<f64>,
}

impl PvUpdate {
    pub fn is_empty(&self) -> bool {
        self.setpoint.is_none()
            && self.description.is_none()
            && self.device.is_none()
            && self.tags.is_none()
            && self.abs_tolerance.is_none()
            && self.rel_tolerance.is_none()
    }

    pub fn apply_to(&self, pv: &mut Pv) {
        if let Some(setpoint) = &self.setpoint {
            pv.setpoint = setpoint.clone();
        }
        if let Some(description) = &self.description {
            pv.description = description.clone();
        }
        if let Some(device) = &self.device {
            pv.device = device.clone();
        }
        if let Some(tags) = &self.tags {
            pv.tags = tags.clone();
        }
        if let Some(tol) = self.abs_tolerance {
            pv.abs_tolerance = Some(tol);
        }
        if let Some(tol) = self.rel_tolerance {
            pv.rel_tolerance = Some(tol);
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Values of every configured PV (and the meta PVs) at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pvs: Vec<Pv>,
    #[serde(default)]
    pub meta_pvs: Vec<Pv>,
    #[serde(default = "crate::utcnow")]
    pub creation_time: DateTime<Utc>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: String::new(),
            description: String::new(),
            pvs: Vec::new(),
            meta_pvs: Vec::new(),
            creation_time: crate::utcnow(),
        }
    }
}

impl Snapshot {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Saved PV whose setpoint (or readback) is `address`
    pub fn find_pv(&self, address: &str) -> Option<&Pv> {
        self.pvs
            .iter()
            .find(|pv| pv.setpoint == address)
            .or_else(|| self.pvs.iter().find(|pv| pv.readback == address))
    }
}

// ============================================================================
// Entry
// ============================================================================

/// Discriminant for `Entry`, usable as a search value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Pv,
    Snapshot,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Pv => f.write_str("pv"),
            EntryKind::Snapshot => f.write_str("snapshot"),
        }
    }
}

impl std::str::FromStr for EntryKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pv" => Ok(EntryKind::Pv),
            "snapshot" => Ok(EntryKind::Snapshot),
            other => Err(ModelError::validation(format!("Unknown entry type: {}", other))),
        }
    }
}

/// Anything a backend stores by uuid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry_type", rename_all = "snake_case")]
pub enum Entry {
    Pv(Pv),
    Snapshot(Snapshot),
}

/// Attribute value extracted from an entry for searching
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
    Time(DateTime<Utc>),
    Tags(TagSet),
    Kind(EntryKind),
    List(Vec<AttrValue>),
}

impl AttrValue {
    fn from_epics(value: &EpicsValue) -> Self {
        match value {
            EpicsValue::Bool(b) => AttrValue::Bool(*b),
            EpicsValue::Int(i) => AttrValue::Int(*i),
            EpicsValue::Float(f) => AttrValue::Float(*f),
            EpicsValue::Str(s) => AttrValue::Str(s.clone()),
            EpicsValue::IntArray(v) => {
                AttrValue::List(v.iter().map(|i| AttrValue::Int(*i)).collect())
            },
            EpicsValue::FloatArray(v) => {
                AttrValue::List(v.iter().map(|f| AttrValue::Float(*f)).collect())
            },
        }
    }
}

impl Entry {
    pub fn uuid(&self) -> Uuid {
        match self {
            Entry::Pv(pv) => pv.uuid,
            Entry::Snapshot(snapshot) => snapshot.uuid,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Pv(_) => EntryKind::Pv,
            Entry::Snapshot(_) => EntryKind::Snapshot,
        }
    }

    pub fn as_pv(&self) -> Option<&Pv> {
        match self {
            Entry::Pv(pv) => Some(pv),
            Entry::Snapshot(_) => None,
        }
    }

    pub fn as_snapshot(&self) -> Option<&Snapshot> {
        match self {
            Entry::Snapshot(snapshot) => Some(snapshot),
            Entry::Pv(_) => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Entry::Pv(pv) => pv.validate(),
            Entry::Snapshot(snapshot) => snapshot.pvs.iter().try_for_each(Pv::validate),
        }
    }

    /// Searchable attribute by name; `None` when the entry has no such field
    pub fn attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "entry_type" => return Some(AttrValue::Kind(self.kind())),
            "uuid" => return Some(AttrValue::Uuid(self.uuid())),
            _ => {},
        }

        match self {
            Entry::Pv(pv) => pv_attr(pv, name),
            Entry::Snapshot(snapshot) => match name {
                "title" => Some(AttrValue::Str(snapshot.title.clone())),
                "description" => Some(AttrValue::Str(snapshot.description.clone())),
                "creation_time" => Some(AttrValue::Time(snapshot.creation_time)),
                _ => None,
            },
        }
    }
}

fn pv_attr(pv: &Pv, name: &str) -> Option<AttrValue> {
    match name {
        "description" => Some(AttrValue::Str(pv.description.clone())),
        "setpoint" => Some(AttrValue::Str(pv.setpoint.clone())),
        "readback" => Some(AttrValue::Str(pv.readback.clone())),
        "config" => Some(AttrValue::Str(pv.config.clone())),
        "device" => Some(AttrValue::Str(pv.device.clone())),
        "tags" => Some(AttrValue::Tags(pv.tags.clone())),
        "abs_tolerance" => pv.abs_tolerance.map(AttrValue::Float),
        "rel_tolerance" => pv.rel_tolerance.map(AttrValue::Float),
        "creation_time" => Some(AttrValue::Time(pv.creation_time)),
        "setpoint_data.data" => pv.setpoint_data.data.as_ref().map(AttrValue::from_epics),
        "readback_data.data" => pv.readback_data.data.as_ref().map(AttrValue::from_epics),
        "config_data.data" => pv.config_data.data.as_ref().map(AttrValue::from_epics),
        "setpoint_data.severity" => Some(AttrValue::Str(pv.setpoint_data.severity.to_string())),
        "readback_data.severity" => Some(AttrValue::Str(pv.readback_data.severity.to_string())),
        _ => None,
    }
}

impl From<Pv> for Entry {
    fn from(pv: Pv) -> Self {
        Entry::Pv(pv)
    }
}

impl From<Snapshot> for Entry {
    fn from(snapshot: Snapshot) -> Self {
        Entry::Snapshot(snapshot)
    }
}
