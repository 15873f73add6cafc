//! Search terms and the comparison every backend applies
//!
//! A search is a list of `(attr, op, value)` terms; an entry matches when all
//! terms hold. Entries without the attribute never match.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use uuid::Uuid;

use pvsnap_model::{tags, AttrValue, Entry, EntryKind};

use crate::error::{BackendError, Result};

/// Search target; same shape as the attribute values of an entry
pub type SearchValue = AttrValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchOp {
    Eq,
    /// Less than or equal; subset for tag sets
    Lt,
    /// Greater than or equal; superset for tag sets
    Gt,
    In,
    /// Regex search
    Like,
    /// Tolerance match, expanded by the client into `gt` + `lt`
    IsClose,
}

impl SearchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOp::Eq => "eq",
            SearchOp::Lt => "lt",
            SearchOp::Gt => "gt",
            SearchOp::In => "in",
            SearchOp::Like => "like",
            SearchOp::IsClose => "isclose",
        }
    }
}

impl fmt::Display for SearchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchOp {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "eq" => Ok(SearchOp::Eq),
            "lt" => Ok(SearchOp::Lt),
            "gt" => Ok(SearchOp::Gt),
            "in" => Ok(SearchOp::In),
            "like" => Ok(SearchOp::Like),
            "isclose" => Ok(SearchOp::IsClose),
            other => Err(BackendError::UnsupportedOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchTerm {
    pub attr: String,
    pub op: SearchOp,
    pub value: SearchValue,
}

impl SearchTerm {
    pub fn new(attr: impl Into<String>, op: SearchOp, value: impl Into<SearchValueArg>) -> Self {
        Self {
            attr: attr.into(),
            op,
            value: value.into().0,
        }
    }

    /// Shorthand for `entry_type eq kind`
    pub fn entry_type(kind: EntryKind) -> Self {
        Self::new("entry_type", SearchOp::Eq, AttrValue::Kind(kind))
    }

    /// Parse `attr op value` as typed on the command line
    ///
    /// The value is typed from its text: `uuid` and `entry_type` attributes
    /// get their own types, `(a, b)` is a list, then bool, int, float and
    /// RFC 3339 timestamps are tried before falling back to a string.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.trim().splitn(3, char::is_whitespace);
        let (attr, op, raw) = match (parts.next(), parts.next(), parts.next()) {
            (Some(attr), Some(op), Some(raw)) if !attr.is_empty() => (attr, op, raw.trim()),
            _ => {
                return Err(BackendError::InvalidSearch(format!(
                    "expected 'attr op value', got '{}'",
                    text
                )))
            },
        };
        let op: SearchOp = op.parse()?;
        let value = parse_value(attr, raw)?;
        Ok(Self {
            attr: attr.to_string(),
            op,
            value,
        })
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.attr, self.op, self.value)
    }
}

/// Conversion helper so `SearchTerm::new` takes plain Rust values
pub struct SearchValueArg(SearchValue);

impl From<AttrValue> for SearchValueArg {
    fn from(value: AttrValue) -> Self {
        Self(value)
    }
}

impl From<&str> for SearchValueArg {
    fn from(value: &str) -> Self {
        Self(AttrValue::Str(value.to_string()))
    }
}

impl From<String> for SearchValueArg {
    fn from(value: String) -> Self {
        Self(AttrValue::Str(value))
    }
}

impl From<f64> for SearchValueArg {
    fn from(value: f64) -> Self {
        Self(AttrValue::Float(value))
    }
}

impl From<i64> for SearchValueArg {
    fn from(value: i64) -> Self {
        Self(AttrValue::Int(value))
    }
}

impl From<Uuid> for SearchValueArg {
    fn from(value: Uuid) -> Self {
        Self(AttrValue::Uuid(value))
    }
}

impl From<tags::TagSet> for SearchValueArg {
    fn from(value: tags::TagSet) -> Self {
        Self(AttrValue::Tags(value))
    }
}

fn parse_scalar(attr: &str, raw: &str) -> Result<SearchValue> {
    let raw = raw.trim();
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    if let Some(s) = unquoted {
        return Ok(AttrValue::Str(s.to_string()));
    }

    match attr {
        "uuid" => {
            return Uuid::parse_str(raw)
                .map(AttrValue::Uuid)
                .map_err(|e| BackendError::InvalidSearch(format!("bad uuid '{}': {}", raw, e)))
        },
        "entry_type" => {
            return raw
                .parse::<EntryKind>()
                .map(AttrValue::Kind)
                .map_err(|e| BackendError::InvalidSearch(e.to_string()))
        },
        _ => {},
    }

    if let Ok(b) = raw.parse::<bool>() {
        return Ok(AttrValue::Bool(b));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(AttrValue::Int(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Ok(AttrValue::Float(f));
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(AttrValue::Time(t.with_timezone(&Utc)));
    }
    Ok(AttrValue::Str(raw.to_string()))
}

fn parse_value(attr: &str, raw: &str) -> Result<SearchValue> {
    if let Some(inner) = raw.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        let items = inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|item| parse_scalar(attr, item))
            .collect::<Result<Vec<_>>>()?;
        return Ok(AttrValue::List(items));
    }
    parse_scalar(attr, raw)
}

// ============================================================================
// Comparison
// ============================================================================

fn as_number(value: &AttrValue) -> Option<f64> {
    match value {
        AttrValue::Int(i) => Some(*i as f64),
        AttrValue::Float(f) => Some(*f),
        _ => None,
    }
}

fn values_eq(data: &AttrValue, target: &AttrValue) -> bool {
    if let (Some(a), Some(b)) = (as_number(data), as_number(target)) {
        return a == b;
    }
    match (data, target) {
        (AttrValue::Uuid(u), AttrValue::Str(s)) | (AttrValue::Str(s), AttrValue::Uuid(u)) => {
            u.to_string() == *s
        },
        (AttrValue::Kind(k), AttrValue::Str(s)) | (AttrValue::Str(s), AttrValue::Kind(k)) => {
            k.to_string() == *s
        },
        (AttrValue::List(a), AttrValue::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_eq(x, y))
        },
        _ => data == target,
    }
}

/// Ordering of two values of compatible types; `None` when incomparable
fn values_cmp(data: &AttrValue, target: &AttrValue) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(data), as_number(target)) {
        return a.partial_cmp(&b);
    }
    match (data, target) {
        (AttrValue::Str(a), AttrValue::Str(b)) => Some(a.cmp(b)),
        (AttrValue::Time(a), AttrValue::Time(b)) => Some(a.cmp(b)),
        (AttrValue::Bool(a), AttrValue::Bool(b)) => Some(a.cmp(b)),
        (AttrValue::Uuid(a), AttrValue::Uuid(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn like_text(data: &AttrValue) -> Option<String> {
    match data {
        AttrValue::Str(s) => Some(s.clone()),
        AttrValue::Uuid(u) => Some(u.to_string()),
        AttrValue::Kind(k) => Some(k.to_string()),
        _ => None,
    }
}

/// Whether `data` and `target` satisfy `op`
///
/// Values of incomparable types do not match. `like` requires a string
/// pattern; `isclose` must be expanded before it reaches a backend.
pub fn compare(op: SearchOp, data: &AttrValue, target: &AttrValue) -> Result<bool> {
    match op {
        SearchOp::Eq => Ok(values_eq(data, target)),
        SearchOp::Lt => Ok(match (data, target) {
            (AttrValue::Tags(d), AttrValue::Tags(t)) => tags::is_subset(d, t),
            _ => matches!(
                values_cmp(data, target),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }),
        SearchOp::Gt => Ok(match (data, target) {
            (AttrValue::Tags(d), AttrValue::Tags(t)) => tags::is_subset(t, d),
            _ => matches!(
                values_cmp(data, target),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }),
        SearchOp::In => Ok(match (data, target) {
            (_, AttrValue::List(items)) => items.iter().any(|item| values_eq(data, item)),
            (AttrValue::Str(d), AttrValue::Str(t)) => t.contains(d.as_str()),
            _ => false,
        }),
        SearchOp::Like => {
            let pattern = match target {
                AttrValue::Str(p) => p,
                other => {
                    return Err(BackendError::InvalidSearch(format!(
                        "'like' needs a string pattern, got {:?}",
                        other
                    )))
                },
            };
            let re = Regex::new(pattern).map_err(|e| {
                BackendError::InvalidSearch(format!("bad pattern '{}': {}", pattern, e))
            })?;
            Ok(like_text(data).is_some_and(|text| re.is_match(&text)))
        },
        SearchOp::IsClose => Err(BackendError::UnsupportedOperator(op.to_string())),
    }
}

/// Check the terms once up front so that every backend rejects bad searches
/// the same way, even when no entry would be compared
pub fn validate_terms(terms: &[SearchTerm]) -> Result<()> {
    for term in terms {
        match (&term.op, &term.value) {
            (SearchOp::IsClose, _) => {
                return Err(BackendError::UnsupportedOperator(term.op.to_string()))
            },
            (SearchOp::Like, AttrValue::Str(pattern)) => {
                Regex::new(pattern).map_err(|e| {
                    BackendError::InvalidSearch(format!("bad pattern '{}': {}", pattern, e))
                })?;
            },
            (SearchOp::Like, other) => {
                return Err(BackendError::InvalidSearch(format!(
                    "'like' needs a string pattern, got {:?}",
                    other
                )))
            },
            _ => {},
        }
    }
    Ok(())
}

/// Whether `entry` satisfies every term
pub fn matches(entry: &Entry, terms: &[SearchTerm]) -> Result<bool> {
    for term in terms {
        let hit = match entry.attr(&term.attr) {
            Some(data) => compare(term.op, &data, &term.value)?,
            None => false,
        };
        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Filter `entries` down to those matching every term
pub fn filter_entries<I>(entries: I, terms: &[SearchTerm]) -> Result<Vec<Entry>>
where
    I: IntoIterator<Item = Entry>,
{
    validate_terms(terms)?;
    let mut found = Vec::new();
    for entry in entries {
        if matches(&entry, terms)? {
            found.push(entry);
        }
    }
    Ok(found)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use pvsnap_model::{EpicsData, Pv, Snapshot, TagSet};

    fn tagset(pairs: &[(u32, &[u32])]) -> TagSet {
        pairs
            .iter()
            .map(|(g, ids)| (*g, ids.iter().copied().collect()))
            .collect()
    }

    #[test]
    fn test_eq_mixes_ints_and_floats() {
        assert!(compare(SearchOp::Eq, &AttrValue::Int(2), &AttrValue::Float(2.0)).unwrap());
        assert!(!compare(SearchOp::Eq, &AttrValue::Int(2), &AttrValue::Str("2".into())).unwrap());
    }

    #[test]
    fn test_lt_gt_are_inclusive() {
        let five = AttrValue::Float(5.0);
        assert!(compare(SearchOp::Lt, &five, &AttrValue::Int(5)).unwrap());
        assert!(compare(SearchOp::Gt, &five, &AttrValue::Int(5)).unwrap());
        assert!(!compare(SearchOp::Gt, &five, &AttrValue::Int(6)).unwrap());
        // incomparable types never match
        assert!(!compare(SearchOp::Lt, &five, &AttrValue::Str("x".into())).unwrap());
    }

    #[test]
    fn test_tag_subset_semantics() {
        let small = AttrValue::Tags(tagset(&[(0, &[1])]));
        let big = AttrValue::Tags(tagset(&[(0, &[1, 2]), (1, &[3])]));
        assert!(compare(SearchOp::Lt, &small, &big).unwrap());
        assert!(!compare(SearchOp::Lt, &big, &small).unwrap());
        assert!(compare(SearchOp::Gt, &big, &small).unwrap());
        assert!(!compare(SearchOp::Gt, &small, &big).unwrap());
    }

    #[test]
    fn test_in_and_like() {
        let list = AttrValue::List(vec![AttrValue::Str("a".into()), AttrValue::Int(3)]);
        assert!(compare(SearchOp::In, &AttrValue::Float(3.0), &list).unwrap());
        assert!(compare(
            SearchOp::In,
            &AttrValue::Str("GUN".into()),
            &AttrValue::Str("LASR:GUNB".into())
        )
        .unwrap());

        let pattern = AttrValue::Str("^LASR:.*:TEST\\d$".into());
        assert!(compare(SearchOp::Like, &AttrValue::Str("LASR:GUNB:TEST1".into()), &pattern).unwrap());
        assert!(!compare(SearchOp::Like, &AttrValue::Int(1), &pattern).unwrap());

        let err = compare(SearchOp::Like, &AttrValue::Str("x".into()), &AttrValue::Int(1));
        assert!(matches!(err, Err(BackendError::InvalidSearch(_))));
        let err = compare(SearchOp::IsClose, &AttrValue::Int(1), &AttrValue::Int(1));
        assert!(matches!(err, Err(BackendError::UnsupportedOperator(_))));
    }

    #[test]
    fn test_like_matches_uuid_text() {
        let id = Uuid::parse_str("a3f1c2d4-0000-4000-8000-000000000001").unwrap();
        assert!(compare(SearchOp::Like, &AttrValue::Uuid(id), &AttrValue::Str("^a3f1".into())).unwrap());
    }

    #[test]
    fn test_parse() {
        let term = SearchTerm::parse("description like ^Gun").unwrap();
        assert_eq!(term.op, SearchOp::Like);
        assert_eq!(term.value, AttrValue::Str("^Gun".into()));

        let term = SearchTerm::parse("setpoint_data.data isclose (1.5, 0.1, 0)").unwrap();
        assert_eq!(
            term.value,
            AttrValue::List(vec![AttrValue::Float(1.5), AttrValue::Float(0.1), AttrValue::Int(0)])
        );

        let term = SearchTerm::parse("entry_type eq snapshot").unwrap();
        assert_eq!(term.value, AttrValue::Kind(EntryKind::Snapshot));

        let term = SearchTerm::parse("description eq \"2\"").unwrap();
        assert_eq!(term.value, AttrValue::Str("2".into()));

        assert!(matches!(
            SearchTerm::parse("description near x"),
            Err(BackendError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            SearchTerm::parse("description"),
            Err(BackendError::InvalidSearch(_))
        ));
        assert!(SearchTerm::parse("uuid eq not-a-uuid").is_err());
    }

    #[test]
    fn test_filter_entries() {
        let pv = Pv::new("SP1", "RB1")
            .with_description("Gun laser")
            .with_setpoint_data(EpicsData::new(1.0));
        let entries = vec![Entry::from(pv), Entry::from(Snapshot::new("morning").with_description("Gun laser check"))];

        let found = filter_entries(
            entries.clone(),
            &[SearchTerm::new("description", SearchOp::Like, "laser")],
        )
        .unwrap();
        assert_eq!(found.len(), 2);

        let found = filter_entries(
            entries.clone(),
            &[
                SearchTerm::entry_type(EntryKind::Pv),
                SearchTerm::new("setpoint_data.data", SearchOp::Gt, 0.5),
            ],
        )
        .unwrap();
        assert_eq!(found.len(), 1);

        // the snapshot has no setpoint, so it never matches
        let found = filter_entries(
            entries,
            &[SearchTerm::new("setpoint", SearchOp::Eq, "SP1")],
        )
        .unwrap();
        assert_eq!(found.len(), 1);
    }
}
