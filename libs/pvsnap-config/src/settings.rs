//! Typed settings built from the INI sections

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config as ConfigLib, File, FileFormat};
use tracing::{debug, warn};

use crate::error::{ConfigError, Result};

/// Largest PV batch the backends accept in one call
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Control layer protocols pvsnap knows about
pub const KNOWN_SHIMS: [&str; 2] = ["ca", "pva"];

type Sections = BTreeMap<String, BTreeMap<String, String>>;

// ============================================================================
// Backend
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-memory backend, alias `memory`
    Test,
    /// JSON documents in a local directory
    Directory,
    /// REST configuration service
    Mongo,
}

impl BackendKind {
    pub const SUPPORTED: [&'static str; 4] = ["test", "memory", "directory", "mongo"];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Test => "test",
            BackendKind::Directory => "directory",
            BackendKind::Mongo => "mongo",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "memory" => Ok(BackendKind::Test),
            "directory" => Ok(BackendKind::Directory),
            "mongo" => Ok(BackendKind::Mongo),
            other => Err(ConfigError::UnsupportedBackend {
                kind: other.to_string(),
                supported: Self::SUPPORTED.join(", "),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub kind: BackendKind,
    /// Directory path (absolute after loading) or service URL
    pub path: Option<String>,
    /// Any other keys of the `[backend]` section
    pub extra: BTreeMap<String, String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Test,
            path: None,
            extra: BTreeMap::new(),
        }
    }
}

impl BackendSettings {
    pub fn new(kind: BackendKind, path: Option<String>) -> Self {
        Self {
            kind,
            path,
            extra: BTreeMap::new(),
        }
    }

    /// Path or URL, required by the directory and mongo backends
    pub fn require_path(&self) -> Result<&str> {
        self.path.as_deref().ok_or_else(|| ConfigError::MissingKey {
            section: "backend".to_string(),
            key: "path".to_string(),
        })
    }
}

// ============================================================================
// Control layer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ControlLayerSettings {
    /// Protocol name -> enabled
    pub shims: BTreeMap<String, bool>,
}

impl Default for ControlLayerSettings {
    /// Every known protocol enabled
    fn default() -> Self {
        Self {
            shims: KNOWN_SHIMS.iter().map(|s| (s.to_string(), true)).collect(),
        }
    }
}

impl ControlLayerSettings {
    pub fn enabled(&self) -> Vec<String> {
        self.shims
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_enabled(&self, shim: &str) -> bool {
        self.shims.get(shim).copied().unwrap_or(false)
    }
}

// ============================================================================
// Demo / import / logging
// ============================================================================

/// Deprecated demo mode: simulated IOC seeded from fixture files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemoSettings {
    pub fixtures: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub max_batch_size: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub dir: Option<PathBuf>,
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    /// File the settings were read from
    pub source: Option<PathBuf>,
    pub backend: BackendSettings,
    pub control_layer: ControlLayerSettings,
    pub meta_pvs: Vec<String>,
    pub demo: Option<DemoSettings>,
    pub import: ImportSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from an INI file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        debug!("Loading configuration file at {}", path.display());

        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        let sections = parse_sections(&text)?;

        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut settings = Self::from_sections(sections, &base)?;
        settings.source = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Discover the configuration file (see `common::find_config`) and load it
    pub fn discover() -> Result<Self> {
        let path = common::find_config()?;
        Self::load(&path)
    }

    /// Parse INI text; relative paths resolve against `base`
    pub fn from_ini_str(text: &str, base: &Path) -> Result<Self> {
        Self::from_sections(parse_sections(text)?, base)
    }

    fn from_sections(mut sections: Sections, base: &Path) -> Result<Self> {
        let backend = match sections.remove("backend") {
            Some(section) => parse_backend(section, base)?,
            None => {
                warn!("No backend specified, loading an empty test backend");
                BackendSettings::default()
            },
        };

        let control_layer = match sections.remove("control_layer") {
            Some(section) => parse_control_layer(section)?,
            None => {
                debug!("No control layer shims specified, loading all available");
                ControlLayerSettings::default()
            },
        };

        let meta_pvs = sections
            .remove("meta_pvs")
            .and_then(|mut s| s.remove("pvs"))
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let demo = match sections.remove("demo") {
            Some(mut section) => {
                warn!("[demo] is deprecated and will be removed; use a test IOC instead");
                let fixtures = section
                    .remove("fixtures")
                    .map(|raw| split_list(&raw))
                    .unwrap_or_default()
                    .iter()
                    .map(|p| resolve_path(base, "demo", "fixtures", p))
                    .collect::<Result<Vec<_>>>()?;
                Some(DemoSettings { fixtures })
            },
            None => None,
        };

        let import = match sections.remove("import") {
            Some(mut section) => match section.remove("max_batch_size") {
                Some(raw) => {
                    let max_batch_size = raw.trim().parse::<usize>().map_err(|e| {
                        ConfigError::invalid_value("import", "max_batch_size", &raw, e.to_string())
                    })?;
                    if max_batch_size == 0 {
                        return Err(ConfigError::invalid_value(
                            "import",
                            "max_batch_size",
                            &raw,
                            "must be greater than zero",
                        ));
                    }
                    ImportSettings { max_batch_size }
                },
                None => ImportSettings::default(),
            },
            None => ImportSettings::default(),
        };

        let logging = match sections.remove("logging") {
            Some(mut section) => LoggingSettings {
                level: section.remove("level").filter(|l| !l.trim().is_empty()),
                dir: section
                    .remove("dir")
                    .map(|d| resolve_path(base, "logging", "dir", &d))
                    .transpose()?,
            },
            None => LoggingSettings::default(),
        };

        for name in sections.keys() {
            let normalized = normalize_section(name);
            if KNOWN_SECTIONS.contains(&normalized.as_str()) {
                warn!(
                    "Ignoring configuration section [{}], did you mean [{}]?",
                    name, normalized
                );
            } else {
                debug!("Ignoring unknown configuration section [{}]", name);
            }
        }

        Ok(Self {
            source: None,
            backend,
            control_layer,
            meta_pvs,
            demo,
            import,
            logging,
        })
    }
}

const KNOWN_SECTIONS: [&str; 6] = [
    "backend",
    "control_layer",
    "meta_pvs",
    "demo",
    "import",
    "logging",
];

fn normalize_section(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

fn parse_sections(text: &str) -> Result<Sections> {
    let folded = fold_continuations(text);
    Ok(ConfigLib::builder()
        .add_source(File::from_str(&folded, FileFormat::Ini))
        .build()?
        .try_deserialize()?)
}

/// Join indented continuation lines onto the key they belong to
///
/// ```text
/// pvs =                 pvs = ACCL:GUN:ENERGY, LASR:SHUTTER
///     ACCL:GUN:ENERGY
///     LASR:SHUTTER
/// ```
fn fold_continuations(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut key_line: Option<usize> = None;
    for line in text.lines() {
        let trimmed = line.trim();
        let comment = trimmed.starts_with(['#', ';']);
        let indented = line.starts_with([' ', '\t']);

        if indented && !trimmed.is_empty() && !comment {
            if let Some(idx) = key_line {
                let value = &mut lines[idx];
                let sep = if value.trim_end().ends_with(['=', ':']) {
                    " "
                } else {
                    ", "
                };
                value.push_str(sep);
                value.push_str(trimmed);
                continue;
            }
        }

        if trimmed.starts_with('[') {
            key_line = None;
        } else if !trimmed.is_empty() && !comment {
            key_line = Some(lines.len());
        }
        lines.push(line.to_string());
    }
    lines.join("\n")
}

fn resolve_path(base: &Path, section: &str, key: &str, raw: &str) -> Result<PathBuf> {
    common::build_abs_path(base, raw.trim())
        .map_err(|e| ConfigError::invalid_value(section, key, raw, e.to_string()))
}

fn parse_backend(mut section: BTreeMap<String, String>, base: &Path) -> Result<BackendSettings> {
    let kind: BackendKind = section
        .remove("type")
        .ok_or_else(|| ConfigError::MissingKey {
            section: "backend".to_string(),
            key: "type".to_string(),
        })?
        .parse()?;

    let path = match section.remove("path") {
        Some(raw) if kind == BackendKind::Directory => Some(
            resolve_path(base, "backend", "path", &raw)?
                .to_string_lossy()
                .into_owned(),
        ),
        Some(raw) => Some(raw.trim().to_string()),
        None => None,
    };

    Ok(BackendSettings {
        kind,
        path,
        extra: section,
    })
}

fn parse_control_layer(section: BTreeMap<String, String>) -> Result<ControlLayerSettings> {
    let mut shims = BTreeMap::new();
    for (name, raw) in section {
        let enabled = parse_bool(&raw)
            .ok_or_else(|| ConfigError::invalid_value("control_layer", &name, &raw, "expected a boolean"))?;
        if !KNOWN_SHIMS.contains(&name.as_str()) {
            warn!("Unknown control layer shim '{}'", name);
        }
        shims.insert(name, enabled);
    }
    Ok(ControlLayerSettings { shims })
}

/// INI boolean: true/false, yes/no, on/off, 1/0 (case-insensitive)
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Split a newline or comma separated list, dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("A:B\nC:D, E:F,,\n"), vec!["A:B", "C:D", "E:F"]);
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_fold_continuations() {
        let folded = fold_continuations(
            "[meta_pvs]\npvs =\n    ACCL:GUN:ENERGY\n\t LASR:SHUTTER\n# note\n[logging]\nlevel = info\n",
        );
        assert_eq!(
            folded,
            "[meta_pvs]\npvs = ACCL:GUN:ENERGY, LASR:SHUTTER\n# note\n[logging]\nlevel = info"
        );
        // an indented line with no key above it is left alone
        assert_eq!(fold_continuations("  stray\n[a]"), "  stray\n[a]");
    }

    #[test]
    fn test_meta_pvs_one_per_line() {
        let settings = Settings::from_ini_str(
            "[backend]\ntype = test\n[meta_pvs]\npvs =\n    ACCL:GUN:ENERGY\n    LASR:SHUTTER\n",
            Path::new("."),
        )
        .unwrap();
        assert_eq!(settings.meta_pvs, vec!["ACCL:GUN:ENERGY", "LASR:SHUTTER"]);

        let settings = Settings::from_ini_str(
            "[meta_pvs]\npvs = A:1, B:2\n    C:3\n[import]\nmax_batch_size = 5\n",
            Path::new("."),
        )
        .unwrap();
        assert_eq!(settings.meta_pvs, vec!["A:1", "B:2", "C:3"]);
        assert_eq!(settings.import.max_batch_size, 5);
    }

    #[test]
    #[traced_test]
    fn test_misspelled_section_warns() {
        let settings = Settings::from_ini_str(
            "[backend]\ntype = test\n[meta PVs]\npvs = A:1\n",
            Path::new("."),
        )
        .unwrap();
        assert!(settings.meta_pvs.is_empty());
        assert!(logs_contain("did you mean [meta_pvs]"));
    }

    #[test]
    fn test_backend_kind() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Test);
        assert_eq!("Directory".parse::<BackendKind>().unwrap(), BackendKind::Directory);
        let err = "filestore".parse::<BackendKind>().unwrap_err();
        assert!(err.to_string().contains("mongo"));
    }

    #[test]
    fn test_control_layer_enabled() {
        let mut settings = ControlLayerSettings::default();
        assert_eq!(settings.enabled(), vec!["ca", "pva"]);
        settings.shims.insert("pva".into(), false);
        assert!(settings.is_enabled("ca"));
        assert!(!settings.is_enabled("pva"));
        assert!(!settings.is_enabled("tango"));
    }

    #[test]
    #[traced_test]
    fn test_missing_sections_use_defaults() {
        let settings = Settings::from_ini_str("[meta_pvs]\npvs = A\n", Path::new(".")).unwrap();
        assert_eq!(settings.backend.kind, BackendKind::Test);
        assert_eq!(settings.control_layer.enabled(), vec!["ca", "pva"]);
        assert_eq!(settings.import.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert!(logs_contain("No backend specified"));
    }

    #[test]
    #[traced_test]
    fn test_demo_fixtures_are_deprecated() {
        let settings = Settings::from_ini_str(
            "[backend]\ntype = test\n[demo]\nfixtures = ioc.json, extra.json\n",
            Path::new("/srv/demo"),
        )
        .unwrap();
        let demo = settings.demo.unwrap();
        assert_eq!(demo.fixtures.len(), 2);
        assert_eq!(demo.fixtures[0], Path::new("/srv/demo/ioc.json"));
        assert!(logs_contain("deprecated"));
    }
}
