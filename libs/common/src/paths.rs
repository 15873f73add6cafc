//! Path expansion and configuration file discovery

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "PVSNAP_CFG";

/// File names checked in each search directory, in order
const CONFIG_NAMES: [&str; 2] = [".pvsnap.cfg", "pvsnap.cfg"];

/// Expand `~` and environment variables in `path`, then make it absolute
/// relative to `base` if it is still relative
pub fn build_abs_path(base: &Path, path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).map_err(|e| Error::PathExpansion {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let expanded = PathBuf::from(expanded.as_ref());

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base.join(expanded))
    }
}

/// Candidate configuration paths in search order
///
/// 1. `$PVSNAP_CFG` when set (the only candidate in that case)
/// 2. `$XDG_CONFIG_HOME`, or the working directory when unset
/// 3. `~/.config`
pub fn config_candidates() -> Vec<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        if !explicit.is_empty() {
            return vec![PathBuf::from(explicit)];
        }
    }

    let mut dirs_to_search = Vec::new();
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => dirs_to_search.push(PathBuf::from(xdg)),
        _ => dirs_to_search.push(PathBuf::from(".")),
    }
    if let Some(home) = dirs::home_dir() {
        dirs_to_search.push(home.join(".config"));
    }

    dirs_to_search
        .iter()
        .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| dir.join(name)))
        .collect()
}

/// First existing configuration file
///
/// An explicit `$PVSNAP_CFG` that does not exist is an error rather than a
/// fallthrough to the default locations.
pub fn find_config() -> Result<PathBuf> {
    let candidates = config_candidates();
    for path in &candidates {
        if path.is_file() {
            tracing::debug!("Using configuration file {}", path.display());
            return Ok(path.clone());
        }
    }
    Err(Error::ConfigNotFound(candidates))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_abs_path_relative() {
        let base = Path::new("/etc/pvsnap");
        assert_eq!(
            build_abs_path(base, "db").unwrap(),
            PathBuf::from("/etc/pvsnap/db")
        );
        assert_eq!(
            build_abs_path(base, "/var/lib/pvsnap").unwrap(),
            PathBuf::from("/var/lib/pvsnap")
        );
    }

    #[test]
    #[serial]
    fn test_build_abs_path_expands_variables() {
        std::env::set_var("PVSNAP_TEST_ROOT", "/data");
        let path = build_abs_path(Path::new("/base"), "$PVSNAP_TEST_ROOT/db").unwrap();
        assert_eq!(path, PathBuf::from("/data/db"));
        std::env::remove_var("PVSNAP_TEST_ROOT");

        assert!(build_abs_path(Path::new("/base"), "$PVSNAP_UNSET_VARIABLE/db").is_err());
    }

    #[test]
    #[serial]
    fn test_find_config_env_override() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("custom.cfg");
        fs::write(&cfg, "[backend]\ntype = test\n").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &cfg);
        assert_eq!(find_config().unwrap(), cfg);

        std::env::set_var(CONFIG_ENV_VAR, dir.path().join("missing.cfg"));
        assert!(matches!(find_config(), Err(Error::ConfigNotFound(_))));
        std::env::remove_var(CONFIG_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_find_config_xdg_prefers_hidden_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pvsnap.cfg"), "").unwrap();
        fs::write(dir.path().join(".pvsnap.cfg"), "").unwrap();

        std::env::remove_var(CONFIG_ENV_VAR);
        std::env::set_var("XDG_CONFIG_HOME", dir.path());
        assert_eq!(find_config().unwrap(), dir.path().join(".pvsnap.cfg"));

        fs::remove_file(dir.path().join(".pvsnap.cfg")).unwrap();
        assert_eq!(find_config().unwrap(), dir.path().join("pvsnap.cfg"));
        std::env::remove_var("XDG_CONFIG_HOME");
    }
}
