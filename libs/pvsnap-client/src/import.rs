//! CSV import of PV configurations
//!
//! The file has one PV per row:
//!
//! ```text
//! Setpoint,Readback,Description,Area,Subsystem
//! LASR:SP:1,LASR:RB:1,Laser power,GUNB,"Timing,Klystron Timing"
//! ```
//!
//! `Setpoint`, `Readback`, `Description` and `Device` are reserved columns;
//! every other column names a tag group, and its cells list tag names of that
//! group. Imports are all-or-nothing: one bad row rejects the whole file.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use pvsnap_backend::BackendError;
use pvsnap_model::{tags, Pv, TagDef, TagSet};

use crate::client::Client;

pub const SETPOINT_COLUMN: &str = "Setpoint";
pub const READBACK_COLUMN: &str = "Readback";
pub const DESCRIPTION_COLUMN: &str = "Description";
pub const DEVICE_COLUMN: &str = "Device";

const RESERVED_COLUMNS: [&str; 4] = [
    SETPOINT_COLUMN,
    READBACK_COLUMN,
    DESCRIPTION_COLUMN,
    DEVICE_COLUMN,
];

/// Cell contents treated as "no tags" (spreadsheet exports leave these behind)
const EMPTY_MARKERS: [&str; 2] = ["nan", "none"];

// ============================================================================
// Errors
// ============================================================================

/// A problem with one data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Line in the file, counting the header as line 1
    pub line: u64,
    pub message: String,
}

impl RowError {
    fn new(line: u64, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

fn summarize(errors: &[RowError]) -> String {
    let mut text = errors
        .iter()
        .take(3)
        .map(RowError::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if errors.len() > 3 {
        text.push_str(&format!("; ... and {} more", errors.len() - 3));
    }
    text
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV header needs a 'Setpoint' or 'Readback' column")]
    MissingAddressColumn,

    #[error("{} invalid row(s), nothing imported: {}", .0.len(), summarize(.0))]
    InvalidRows(Vec<RowError>),

    #[error("{rows} PVs exceed the import limit of {limit}, nothing imported")]
    BatchTooLarge { rows: usize, limit: usize },

    #[error("Backend rejected the import: {0}")]
    Backend(#[from] BackendError),
}

// ============================================================================
// Parsing
// ============================================================================

/// One data row, addresses and names as written in the file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CsvRow {
    pub line: u64,
    pub setpoint: String,
    pub readback: String,
    pub description: String,
    pub device: String,
    /// Tag group name -> tag names; groups with empty cells are left out
    pub groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedCsv {
    /// Tag group columns in header order
    pub tag_groups: Vec<String>,
    pub rows: Vec<CsvRow>,
    pub errors: Vec<RowError>,
}

/// Tag names in one cell: comma separated, trimmed, placeholders dropped
pub fn split_tags(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| !EMPTY_MARKERS.contains(&name.to_ascii_lowercase().as_str()))
        .map(str::to_string)
        .collect()
}

/// Parse CSV text into rows
///
/// Rows without any content are skipped; rows with neither address are kept
/// as errors.
pub fn parse_csv<R: Read>(reader: R) -> Result<ParsedCsv, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let setpoint_col = column(SETPOINT_COLUMN);
    let readback_col = column(READBACK_COLUMN);
    if setpoint_col.is_none() && readback_col.is_none() {
        return Err(ImportError::MissingAddressColumn);
    }
    let description_col = column(DESCRIPTION_COLUMN);
    let device_col = column(DEVICE_COLUMN);

    let mut group_cols: Vec<(usize, String)> = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if header.is_empty() || RESERVED_COLUMNS.contains(&header) {
            continue;
        }
        if group_cols.iter().any(|(_, name)| name == header) {
            warn!("Duplicate tag group column '{}' ignored", header);
            continue;
        }
        group_cols.push((idx, header.to_string()));
    }

    let mut parsed = ParsedCsv {
        tag_groups: group_cols.iter().map(|(_, name)| name.clone()).collect(),
        ..ParsedCsv::default()
    };

    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 2);
        if record.iter().all(str::is_empty) {
            continue;
        }
        let cell = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .unwrap_or_default()
                .to_string()
        };

        let row = CsvRow {
            line,
            setpoint: cell(setpoint_col),
            readback: cell(readback_col),
            description: cell(description_col),
            device: cell(device_col),
            groups: group_cols
                .iter()
                .map(|(c, name)| (name.clone(), split_tags(record.get(*c).unwrap_or_default())))
                .filter(|(_, names)| !names.is_empty())
                .collect(),
        };

        if row.setpoint.is_empty() && row.readback.is_empty() {
            parsed
                .errors
                .push(RowError::new(line, "Setpoint and Readback are both empty"));
            continue;
        }
        parsed.rows.push(row);
    }

    debug!(
        "Parsed {} rows, {} tag groups, {} row errors",
        parsed.rows.len(),
        parsed.tag_groups.len(),
        parsed.errors.len()
    );
    Ok(parsed)
}

/// Turn parsed rows into PVs, resolving tag names against `tag_def`
///
/// Parse errors, unknown tag groups or tags and addresses repeated within
/// the file are all collected and reported together.
pub fn build_pvs(parsed: &ParsedCsv, tag_def: &TagDef) -> Result<Vec<Pv>, ImportError> {
    let mut errors = parsed.errors.clone();
    let mut seen: HashMap<&str, u64> = HashMap::new();
    let mut pvs = Vec::with_capacity(parsed.rows.len());

    for row in &parsed.rows {
        let mut row_ok = true;
        let mut tag_set = TagSet::new();
        for (group, names) in &row.groups {
            match tags::resolve_names(tag_def, group, names) {
                Ok((group_id, ids)) => {
                    tag_set.insert(group_id, ids);
                },
                Err(e) => {
                    errors.push(RowError::new(row.line, e.to_string()));
                    row_ok = false;
                },
            }
        }

        for address in [row.setpoint.as_str(), row.readback.as_str()] {
            if address.is_empty() {
                continue;
            }
            match seen.entry(address) {
                MapEntry::Vacant(slot) => {
                    slot.insert(row.line);
                },
                MapEntry::Occupied(first) => {
                    errors.push(RowError::new(
                        row.line,
                        format!("address '{}' already used on line {}", address, first.get()),
                    ));
                    row_ok = false;
                },
            }
        }

        if row_ok {
            let mut pv = Pv::new(row.setpoint.clone(), row.readback.clone())
                .with_description(row.description.clone())
                .with_tags(tag_set);
            pv.device = row.device.clone();
            pvs.push(pv);
        }
    }

    if !errors.is_empty() {
        errors.sort_by_key(|e| e.line);
        return Err(ImportError::InvalidRows(errors));
    }
    Ok(pvs)
}

// ============================================================================
// Import
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Validate everything but write nothing
    pub dry_run: bool,
    /// Override of the configured batch limit
    pub max_batch: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub tag_groups: Vec<String>,
    /// PVs that were (or, on a dry run, would be) added
    pub pvs: Vec<Pv>,
    pub dry_run: bool,
}

impl ImportReport {
    pub fn count(&self) -> usize {
        self.pvs.len()
    }
}

impl Client {
    /// Import the CSV file at `path` as one batch
    pub async fn import_csv(
        &self,
        path: &Path,
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let file = std::fs::File::open(path)?;
        self.import_reader(file, options).await
    }

    /// Import CSV text from any reader as one batch
    pub async fn import_reader<R: Read>(
        &self,
        reader: R,
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let parsed = parse_csv(reader)?;
        let tag_def = self.backend().get_tags().await?;
        let pvs = build_pvs(&parsed, &tag_def)?;

        let limit = options.max_batch.unwrap_or(self.max_batch_size());
        if pvs.len() > limit {
            return Err(ImportError::BatchTooLarge {
                rows: pvs.len(),
                limit,
            });
        }

        if options.dry_run {
            info!("Dry run: {} PVs would be imported", pvs.len());
            return Ok(ImportReport {
                tag_groups: parsed.tag_groups,
                pvs,
                dry_run: true,
            });
        }

        let stored = self.backend().add_multiple_pvs(pvs).await?;
        info!("Imported {} PVs", stored.len());
        Ok(ImportReport {
            tag_groups: parsed.tag_groups,
            pvs: stored,
            dry_run: false,
        })
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use pvsnap_model::TagGroup;
    use std::collections::BTreeSet;

    fn parse(text: &str) -> ParsedCsv {
        parse_csv(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_header_columns() {
        let parsed = parse("Setpoint,Readback,Region,Area,Subsystem\n");
        assert_eq!(parsed.tag_groups, vec!["Region", "Area", "Subsystem"]);

        let parsed = parse(" Setpoint , Readback ,Description,Device,,Area\n");
        assert_eq!(parsed.tag_groups, vec!["Area"]);
    }

    #[test]
    fn test_missing_address_columns() {
        assert!(matches!(
            parse_csv("Description,Area\nfoo,bar\n".as_bytes()),
            Err(ImportError::MissingAddressColumn)
        ));
        // one address column is enough
        let parsed = parse("Readback,Area\nRB:1,GUNB\n");
        assert_eq!(parsed.rows[0].readback, "RB:1");
        assert_eq!(parsed.rows[0].setpoint, "");
    }

    #[test]
    fn test_quoted_tag_list() {
        let parsed = parse("Setpoint,Readback,Subsystem\nSP:1,RB:1,\"Timing,Klystron Timing\"\n");
        assert_eq!(
            parsed.rows[0].groups["Subsystem"],
            vec!["Timing".to_string(), "Klystron Timing".to_string()]
        );
    }

    #[test]
    fn test_split_tags_placeholders() {
        assert!(split_tags("nan").is_empty());
        assert!(split_tags(" None ").is_empty());
        assert!(split_tags("").is_empty());
        assert_eq!(split_tags("a, ,b"), vec!["a", "b"]);
    }

    #[test]
    fn test_row_errors_and_blank_rows() {
        let parsed = parse("Setpoint,Readback,Description\nSP:1,,one\n,,\n,,orphan\n,RB:2,two\n");
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.errors, vec![RowError::new(4, "Setpoint and Readback are both empty")]);
        assert_eq!(parsed.rows[1].line, 5);
    }

    #[test]
    fn test_build_pvs_resolves_tags() {
        let mut def = TagDef::new();
        def.insert(0, TagGroup::new("Area", "").with_tags([(0, "GUNB"), (1, "IN20")]));
        def.insert(1, TagGroup::new("Subsystem", "").with_tags([(0, "Timing"), (1, "Klystron Timing")]));

        let parsed = parse(
            "Setpoint,Readback,Device,Area,Subsystem\nSP:1,RB:1,LASER,IN20,\"Timing,Klystron Timing\"\n",
        );
        let pvs = build_pvs(&parsed, &def).unwrap();
        assert_eq!(pvs.len(), 1);
        assert_eq!(pvs[0].device, "LASER");
        assert_eq!(pvs[0].tags[&0], BTreeSet::from([1]));
        assert_eq!(pvs[0].tags[&1], BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_build_pvs_collects_all_errors() {
        let mut def = TagDef::new();
        def.insert(0, TagGroup::new("Area", "").with_tags([(0, "GUNB")]));

        let parsed = parse(
            "Setpoint,Readback,Area,Color\nSP:1,RB:1,GUNB,\nSP:2,RB:2,BSY,\nSP:3,RB:3,,red\nSP:1,,,\n,,,\n",
        );
        match build_pvs(&parsed, &def) {
            Err(ImportError::InvalidRows(errors)) => {
                let lines: Vec<u64> = errors.iter().map(|e| e.line).collect();
                assert_eq!(lines, vec![3, 4, 5]);
                assert!(errors[2].message.contains("already used on line 2"));
            },
            other => panic!("expected row errors, got {:?}", other),
        }
    }

    #[test]
    fn test_summary_truncates() {
        let errors: Vec<RowError> = (2..8).map(|l| RowError::new(l, "bad")).collect();
        let text = ImportError::InvalidRows(errors).to_string();
        assert!(text.starts_with("6 invalid row(s)"));
        assert!(text.ends_with("... and 3 more"));
    }
}
