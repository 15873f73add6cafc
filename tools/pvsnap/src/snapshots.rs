//! `pvsnap snapshots` - stored snapshot inspection and export

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use uuid::Uuid;

use pvsnap_backend::{Backend, SnapshotFilter};
use pvsnap_client::Client;
use pvsnap_model::{Entry, Snapshot};

use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// List stored snapshots
    List {
        /// Only snapshots whose title contains this text
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show the values saved in a snapshot
    Show { id: Uuid },

    /// Delete a snapshot
    Delete { id: Uuid },

    /// Write a snapshot to stdout or a file
    Export {
        id: Uuid,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn handle_command(cmd: SnapshotCommands, client: &Client) -> Result<()> {
    match cmd {
        SnapshotCommands::List { title } => {
            let filter = match title {
                Some(title) => SnapshotFilter::by_title(title),
                None => SnapshotFilter::all(),
            };
            let snapshots = client.backend().get_snapshots(&filter).await?;
            if snapshots.is_empty() {
                println!("{}", "No snapshots".dimmed());
                return Ok(());
            }
            println!(
                "{:<36}  {:<20}  {:>5}  {}",
                "ID".bold(),
                "CREATED".bold(),
                "PVS".bold(),
                "TITLE".bold()
            );
            for snapshot in &snapshots {
                println!(
                    "{:<36}  {:<20}  {:>5}  {}",
                    snapshot.uuid.to_string().bright_black(),
                    snapshot.creation_time.format("%Y-%m-%d %H:%M:%S"),
                    snapshot.pvs.len(),
                    snapshot.title
                );
            }
        },
        SnapshotCommands::Show { id } => {
            let snapshot = client.snapshot(id).await?;
            print_snapshot(&snapshot);
        },
        SnapshotCommands::Delete { id } => {
            let snapshot = client.snapshot(id).await?;
            client.delete(&Entry::Snapshot(snapshot)).await?;
            println!("{} Deleted snapshot {}", "OK".green(), id.to_string().bright_yellow());
        },
        SnapshotCommands::Export { id, format, output } => {
            let snapshot = client.snapshot(id).await?;
            let text = render(&snapshot, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("{} Wrote {}", "OK".green(), path.display());
                },
                None => print!("{}", text),
            }
        },
    }
    Ok(())
}

/// Serialize a snapshot in the requested format
pub fn render(snapshot: &Snapshot, format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::Json => serde_json::to_string_pretty(snapshot)? + "\n",
        ExportFormat::Yaml => serde_yaml::to_string(snapshot)?,
    })
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("{} {}", "Snapshot".bright_cyan(), snapshot.uuid);
    println!("  Title:       {}", snapshot.title);
    if !snapshot.description.is_empty() {
        println!("  Description: {}", snapshot.description);
    }
    println!(
        "  Created:     {}",
        snapshot.creation_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    println!(
        "{:<30}  {:<20}  {:<30}  {:<20}",
        "SETPOINT".bold(),
        "VALUE".bold(),
        "READBACK".bold(),
        "VALUE".bold()
    );
    for pv in snapshot.pvs.iter().chain(snapshot.meta_pvs.iter()) {
        println!(
            "{:<30}  {:<20}  {:<30}  {:<20}",
            pv.setpoint,
            output::data_text(&pv.setpoint_data),
            pv.readback,
            output::data_text(&pv.readback_data)
        );
    }
    if !snapshot.meta_pvs.is_empty() {
        println!("({} meta PVs)", snapshot.meta_pvs.len());
    }
}
