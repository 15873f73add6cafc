//! `pvsnap config` - configuration inspection

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use tracing::debug;

use pvsnap_config::{Settings, KNOWN_SHIMS};
use pvsnap_control::DEFAULT_TIMEOUT;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the configuration file in use
    #[command(about = "Print which configuration file would be loaded")]
    Path,

    /// Print the effective settings
    #[command(about = "Show the settings after defaults and path resolution")]
    Show,
}

/// Report the file `--config` or discovery selects, without parsing it
pub fn print_path(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => common::find_config()?,
    };
    if !path.is_file() {
        eprintln!("{} {} does not exist", "WARNING".yellow(), path.display());
    }
    println!("{}", path.display());
    Ok(())
}

pub fn handle_command(cmd: ConfigCommands, settings: &Settings) -> Result<()> {
    match cmd {
        ConfigCommands::Path => match &settings.source {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", "(built-in defaults)".dimmed()),
        },
        ConfigCommands::Show => {
            debug!("Showing settings from {:?}", settings.source);
            for (key, value) in describe(settings) {
                println!("{:<22} {}", format!("{}:", key).bright_cyan(), value);
            }
        },
    }
    Ok(())
}

/// Key/value lines shown by `config show`
fn describe(settings: &Settings) -> Vec<(&'static str, String)> {
    let none = || "-".to_string();
    let mut lines = vec![
        (
            "file",
            settings
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(none),
        ),
        ("backend", settings.backend.kind.to_string()),
        (
            "backend path",
            settings.backend.path.clone().unwrap_or_else(none),
        ),
    ];

    let shims = KNOWN_SHIMS
        .iter()
        .map(|shim| {
            let state = if settings.control_layer.is_enabled(shim) {
                "on"
            } else {
                "off"
            };
            format!("{}={}", shim, state)
        })
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(("control layer", shims));
    lines.push(("timeout", format!("{}s", DEFAULT_TIMEOUT.as_secs_f64())));

    let meta = if settings.meta_pvs.is_empty() {
        none()
    } else {
        settings.meta_pvs.join(", ")
    };
    lines.push(("meta pvs", meta));

    if let Some(demo) = &settings.demo {
        let fixtures = demo
            .fixtures
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(("demo fixtures", fixtures));
    }

    lines.push(("import batch limit", settings.import.max_batch_size.to_string()));
    lines.push((
        "log level",
        settings
            .logging
            .level
            .clone()
            .unwrap_or_else(|| "warn".to_string()),
    ));
    lines.push((
        "log dir",
        settings
            .logging
            .dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(none),
    ));
    lines
}
