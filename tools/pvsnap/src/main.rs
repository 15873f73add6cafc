//! pvsnap - EPICS PV configuration, snapshot and restore tool
//!
//! Manages the configured PVs and their tags, takes snapshots of the live
//! values, restores and compares them.

mod config;
mod output;
mod pvs;
mod snapshots;
mod tags;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use uuid::Uuid;

use common::logging::{self, LogConfig};
use pvsnap_backend::Backend;
use pvsnap_client::{Client, ImportOptions};
use pvsnap_config::Settings;
use pvsnap_model::{Entry, Snapshot};

use crate::config::ConfigCommands;
use crate::pvs::PvCommands;
use crate::snapshots::SnapshotCommands;
use crate::tags::TagCommands;

#[derive(Parser)]
#[command(name = "pvsnap")]
#[command(about = "pvsnap - EPICS PV configuration, snapshot and restore tool")]
#[command(long_about = "pvsnap - EPICS PV configuration, snapshot and restore tool

Configuration:
  pvs         List, add, update and archive configured PVs
  import      Bulk-import PVs from a CSV file
  tags        Manage tag groups and tags

Snapshots:
  snap        Read every PV and store a snapshot
  snapshots   List, show, delete and export snapshots
  apply       Write saved setpoints back to the machine
  compare     Compare two snapshots

Examples:
  pvsnap pvs list --search \"description like laser\"
  pvsnap import pvs.csv --dry-run
  pvsnap snap --title \"before shutdown\"
  pvsnap compare <id> <id> --only-diff

The configuration file is taken from --config, $PVSNAP_CFG, or the usual
search locations (see 'pvsnap config path').")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configured PVs
    Pvs {
        #[command(subcommand)]
        command: PvCommands,
    },

    /// Import PVs from a CSV file (all rows or none)
    Import {
        /// CSV file with Setpoint, Readback, Description and tag group columns
        file: PathBuf,

        /// Validate without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Largest accepted batch (default from config)
        #[arg(long)]
        max_batch: Option<usize>,
    },

    /// Manage tag groups and tags
    Tags {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// Read every configured PV and store a snapshot
    Snap {
        #[arg(short, long, default_value = "")]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Inspect stored snapshots
    Snapshots {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Write saved setpoints of a snapshot or PV back to the machine
    Apply {
        /// Snapshot or PV id
        id: Uuid,

        /// Put one value at a time, stopping at the first failure
        #[arg(long)]
        sequential: bool,
    },

    /// Compare two snapshots, the first being the reference
    Compare {
        main: Uuid,
        other: Uuid,

        /// Only show PVs that differ
        #[arg(long)]
        only_diff: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => Settings::discover().context("No usable configuration file found")?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // `config path` must work even when the file it reports is broken
    if let Commands::Config {
        command: ConfigCommands::Path,
    } = &cli.command
    {
        return config::print_path(cli.config.as_deref());
    }

    let settings = load_settings(cli.config.as_ref())?;

    let default_level = settings.logging.level.as_deref().unwrap_or("warn");
    logging::init_with_config(LogConfig {
        level: logging::level_for_verbosity(cli.verbose, default_level),
        log_dir: settings.logging.dir.clone(),
        ansi: !cli.no_color,
        ..LogConfig::default()
    })?;

    if let Commands::Config { command } = cli.command {
        return config::handle_command(command, &settings);
    }

    let client = Client::open(&settings)?;

    match cli.command {
        Commands::Pvs { command } => pvs::handle_command(command, &client).await?,
        Commands::Import {
            file,
            dry_run,
            max_batch,
        } => {
            let options = ImportOptions { dry_run, max_batch };
            import_command(&client, &file, &options).await?;
        },
        Commands::Tags { command } => tags::handle_command(command, &client).await?,
        Commands::Snap { title, description } => {
            snap_command(&client, title, description).await?;
        },
        Commands::Snapshots { command } => snapshots::handle_command(command, &client).await?,
        Commands::Apply { id, sequential } => apply_command(&client, id, sequential).await?,
        Commands::Compare {
            main,
            other,
            only_diff,
        } => {
            let rows = client.compare(main, other).await?;
            output::print_comparison(&rows, only_diff);
        },
        Commands::Config { .. } => {},
    }

    Ok(())
}

async fn import_command(client: &Client, file: &Path, options: &ImportOptions) -> Result<()> {
    println!(
        "{} {}",
        "Importing PVs from:".bright_cyan(),
        file.display().to_string().bright_yellow()
    );
    match client.import_csv(file, options).await {
        Ok(report) if report.dry_run => {
            println!(
                "{} {} PVs would be imported (tag groups: {})",
                "OK".green(),
                report.count(),
                report.tag_groups.join(", ")
            );
        },
        Ok(report) => {
            println!("{} Imported {} PVs", "OK".green(), report.count());
        },
        Err(pvsnap_client::ImportError::InvalidRows(rows)) => {
            eprintln!("{} {} invalid rows, nothing imported", "ERROR".red(), rows.len());
            for row in &rows {
                eprintln!("  {} {}", "-".red(), row);
            }
            anyhow::bail!("import rejected");
        },
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn snap_command(client: &Client, title: String, description: String) -> Result<()> {
    let snapshot = client
        .snap(Some(Snapshot::new(title).with_description(description)))
        .await?;
    let unread = snapshot
        .pvs
        .iter()
        .flat_map(|pv| [(&pv.setpoint, &pv.setpoint_data), (&pv.readback, &pv.readback_data)])
        .filter(|(address, data)| !address.is_empty() && !data.has_value())
        .count();
    let (id, count) = (snapshot.uuid, snapshot.pvs.len());
    client.save(Entry::Snapshot(snapshot)).await?;

    println!(
        "{} Stored snapshot {} with {} PVs",
        "OK".green(),
        id.to_string().bright_yellow(),
        count
    );
    if unread > 0 {
        println!("{} {} channels could not be read", "WARNING".yellow(), unread);
    }
    Ok(())
}

async fn apply_command(client: &Client, id: Uuid, sequential: bool) -> Result<()> {
    let entry = client.backend().get_entry(id).await?;
    let statuses = client.apply(&entry, sequential).await?;
    if statuses.is_empty() {
        println!("{} Nothing to apply", "WARNING".yellow());
        return Ok(());
    }

    let mut failed = 0;
    for status in &statuses {
        match status.wait(None).await {
            Ok(()) => println!("  {} {}", "OK".green(), status.label()),
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", "FAIL".red(), status.label(), e);
            },
        }
    }
    if failed > 0 {
        anyhow::bail!("{} of {} puts failed", failed, statuses.len());
    }
    println!("{} Applied {} values", "OK".green(), statuses.len());
    Ok(())
}
