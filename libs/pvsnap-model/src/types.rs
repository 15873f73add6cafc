//! EPICS value containers and alarm enums
//!
//! `EpicsData` is what a control layer read produces and what a snapshot
//! stores for every setpoint/readback/config address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

// ============================================================================
// Values
// ============================================================================

/// Any value an EPICS channel can hold
///
/// Serialized untagged so that the JSON written by the backends is the plain
/// value (`1.5`, `"OPEN"`, `[1, 2, 3]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EpicsValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl EpicsValue {
    /// Scalar numeric view of the value (bools count as 0/1)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EpicsValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            EpicsValue::Int(i) => Some(*i as f64),
            EpicsValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric view of an array value
    pub fn as_f64_array(&self) -> Option<Vec<f64>> {
        match self {
            EpicsValue::IntArray(v) => Some(v.iter().map(|i| *i as f64).collect()),
            EpicsValue::FloatArray(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Integer view, used to index enum strings
    pub fn as_index(&self) -> Option<usize> {
        match self {
            EpicsValue::Int(i) if *i >= 0 => Some(*i as usize),
            EpicsValue::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as usize),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EpicsValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for EpicsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpicsValue::Bool(b) => write!(f, "{}", b),
            EpicsValue::Int(i) => write!(f, "{}", i),
            EpicsValue::Float(x) => write!(f, "{}", x),
            EpicsValue::Str(s) => write!(f, "{}", s),
            EpicsValue::IntArray(v) => write!(f, "{:?}", v),
            EpicsValue::FloatArray(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<f64> for EpicsValue {
    fn from(value: f64) -> Self {
        EpicsValue::Float(value)
    }
}

impl From<i64> for EpicsValue {
    fn from(value: i64) -> Self {
        EpicsValue::Int(value)
    }
}

impl From<bool> for EpicsValue {
    fn from(value: bool) -> Self {
        EpicsValue::Bool(value)
    }
}

impl From<&str> for EpicsValue {
    fn from(value: &str) -> Self {
        EpicsValue::Str(value.to_string())
    }
}

impl From<String> for EpicsValue {
    fn from(value: String) -> Self {
        EpicsValue::Str(value)
    }
}

// ============================================================================
// Alarm enums
// ============================================================================

/// EPICS alarm severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    NoAlarm,
    Minor,
    Major,
    Invalid,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::NoAlarm,
        Severity::Minor,
        Severity::Major,
        Severity::Invalid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::NoAlarm => "NO_ALARM",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .iter()
            .find(|sev| sev.as_str() == s)
            .copied()
            .ok_or_else(|| ModelError::validation(format!("Unknown severity: {}", s)))
    }
}

/// EPICS alarm status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NoAlarm,
    Read,
    Write,
    Hihi,
    High,
    Lolo,
    Low,
    State,
    Cos,
    Comm,
    Timeout,
    Hwlimit,
    Calc,
    Scan,
    Link,
    Soft,
    BadSub,
    Udf,
    Disable,
    Simm,
    ReadAccess,
    WriteAccess,
}

impl Status {
    pub const ALL: [Status; 22] = [
        Status::NoAlarm,
        Status::Read,
        Status::Write,
        Status::Hihi,
        Status::High,
        Status::Lolo,
        Status::Low,
        Status::State,
        Status::Cos,
        Status::Comm,
        Status::Timeout,
        Status::Hwlimit,
        Status::Calc,
        Status::Scan,
        Status::Link,
        Status::Soft,
        Status::BadSub,
        Status::Udf,
        Status::Disable,
        Status::Simm,
        Status::ReadAccess,
        Status::WriteAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NoAlarm => "NO_ALARM",
            Status::Read => "READ",
            Status::Write => "WRITE",
            Status::Hihi => "HIHI",
            Status::High => "HIGH",
            Status::Lolo => "LOLO",
            Status::Low => "LOW",
            Status::State => "STATE",
            Status::Cos => "COS",
            Status::Comm => "COMM",
            Status::Timeout => "TIMEOUT",
            Status::Hwlimit => "HWLIMIT",
            Status::Calc => "CALC",
            Status::Scan => "SCAN",
            Status::Link => "LINK",
            Status::Soft => "SOFT",
            Status::BadSub => "BAD_SUB",
            Status::Udf => "UDF",
            Status::Disable => "DISABLE",
            Status::Simm => "SIMM",
            Status::ReadAccess => "READ_ACCESS",
            Status::WriteAccess => "WRITE_ACCESS",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| ModelError::validation(format!("Unknown status: {}", s)))
    }
}

// ============================================================================
// EpicsData
// ============================================================================

/// Unified EPICS data type holding a value and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicsData {
    #[serde(default)]
    pub data: Option<EpicsValue>,
    #[serde(default = "default_status")]
    pub status: Status,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default = "crate::utcnow")]
    pub timestamp: DateTime<Utc>,

    // Extra metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_ctrl_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_ctrl_limit: Option<f64>,
    /// LOLO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_alarm_limit: Option<f64>,
    /// HIHI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_alarm_limit: Option<f64>,
    /// LOW
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_warning_limit: Option<f64>,
    /// HIGH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_warning_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enums: Option<Vec<String>>,
}

fn default_status() -> Status {
    Status::Udf
}

fn default_severity() -> Severity {
    Severity::Invalid
}

impl Default for EpicsData {
    fn default() -> Self {
        Self {
            data: None,
            status: Status::Udf,
            severity: Severity::Invalid,
            timestamp: crate::utcnow(),
            units: None,
            precision: None,
            upper_ctrl_limit: None,
            lower_ctrl_limit: None,
            lower_alarm_limit: None,
            upper_alarm_limit: None,
            lower_warning_limit: None,
            upper_warning_limit: None,
            enums: None,
        }
    }
}

impl EpicsData {
    /// Data with a value and a clean alarm state
    pub fn new(value: impl Into<EpicsValue>) -> Self {
        Self {
            data: Some(value.into()),
            status: Status::NoAlarm,
            severity: Severity::NoAlarm,
            ..Self::default()
        }
    }

    pub fn with_alarm(mut self, status: Status, severity: Severity) -> Self {
        self.status = status;
        self.severity = severity;
        self
    }

    pub fn with_enums(mut self, enums: Vec<String>) -> Self {
        self.enums = Some(enums);
        self
    }

    pub fn has_value(&self) -> bool {
        self.data.is_some()
    }

    /// Enum string for the stored value, when the channel is an enum
    pub fn enum_string(&self) -> Option<&str> {
        let enums = self.enums.as_ref()?;
        let idx = self.data.as_ref()?.as_index()?;
        enums.get(idx).map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_value_untagged_serialization() {
        assert_eq!(serde_json::to_string(&EpicsValue::Float(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&EpicsValue::Int(3)).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&EpicsValue::Str("OPEN".into())).unwrap(),
            "\"OPEN\""
        );

        let v: EpicsValue = serde_json::from_str("7").unwrap();
        assert_eq!(v, EpicsValue::Int(7));
        let v: EpicsValue = serde_json::from_str("7.25").unwrap();
        assert_eq!(v, EpicsValue::Float(7.25));
        let v: EpicsValue = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(v, EpicsValue::IntArray(vec![1, 2]));
        let v: EpicsValue = serde_json::from_str("[1.5, 2]").unwrap();
        assert_eq!(v, EpicsValue::FloatArray(vec![1.5, 2.0]));
    }

    #[test]
    fn test_status_and_severity_names() {
        assert_eq!(Status::BadSub.as_str(), "BAD_SUB");
        assert_eq!("READ_ACCESS".parse::<Status>().unwrap(), Status::ReadAccess);
        assert!("NOT_A_STATUS".parse::<Status>().is_err());
        assert_eq!("MAJOR".parse::<Severity>().unwrap(), Severity::Major);

        // serde names match as_str for every variant
        for status in Status::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        for severity in Severity::ALL {
            let json = serde_json::to_string(&severity).unwrap();
            assert_eq!(json, format!("\"{}\"", severity.as_str()));
        }
    }

    #[test]
    fn test_epics_data_defaults() {
        let data = EpicsData::default();
        assert!(data.data.is_none());
        assert_eq!(data.status, Status::Udf);
        assert_eq!(data.severity, Severity::Invalid);

        let parsed: EpicsData = serde_json::from_str("{}").unwrap();
        assert!(parsed.data.is_none());
        assert_eq!(parsed.status, Status::Udf);
    }

    #[test]
    fn test_enum_string() {
        let data = EpicsData::new(1i64).with_enums(vec!["OUT".into(), "IN".into()]);
        assert_eq!(data.enum_string(), Some("IN"));
        assert_eq!(EpicsData::new(1i64).enum_string(), None);
    }
}
