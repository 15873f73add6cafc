//! `pvsnap pvs` - configured PV management

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use uuid::Uuid;

use pvsnap_backend::{Backend, SearchTerm};
use pvsnap_client::Client;
use pvsnap_model::{tags, EntryKind, NewPv, Pv, PvUpdate, TagDef, TagSet};

use crate::output;

#[derive(Subcommand)]
pub enum PvCommands {
    /// List current PVs
    #[command(about = "List configured PVs, optionally filtered")]
    List {
        /// Filter as "attr op value", e.g. "setpoint like ^LASR" (repeatable)
        #[arg(short, long = "search")]
        search: Vec<String>,
    },

    /// Add a PV
    #[command(about = "Add a PV to the configuration")]
    Add {
        #[arg(long, default_value = "")]
        setpoint: String,

        #[arg(long, default_value = "")]
        readback: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long, default_value = "")]
        device: String,

        /// Tag as GROUP=TAG (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        abs_tolerance: Option<f64>,

        #[arg(long)]
        rel_tolerance: Option<f64>,
    },

    /// Change fields of a PV
    #[command(about = "Update fields of a configured PV")]
    Update {
        id: Uuid,

        #[arg(long)]
        setpoint: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        device: Option<String>,

        /// Replace all tags; GROUP=TAG (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        abs_tolerance: Option<f64>,

        #[arg(long)]
        rel_tolerance: Option<f64>,
    },

    /// Archive a PV
    #[command(about = "Remove a PV from the configuration; snapshots keep it")]
    Archive { id: Uuid },
}

pub async fn handle_command(cmd: PvCommands, client: &Client) -> Result<()> {
    let backend = client.backend();
    match cmd {
        PvCommands::List { search } => {
            let pvs = if search.is_empty() {
                backend.get_all_pvs().await?
            } else {
                let mut terms = search
                    .iter()
                    .map(|raw| SearchTerm::parse(raw))
                    .collect::<Result<Vec<_>, _>>()?;
                terms.push(SearchTerm::entry_type(EntryKind::Pv));
                client
                    .search(terms)
                    .await?
                    .into_iter()
                    .filter_map(|entry| entry.as_pv().cloned())
                    .collect()
            };
            let def = backend.get_tags().await?;
            output::print_pv_table(&pvs, &def);
        },
        PvCommands::Add {
            setpoint,
            readback,
            description,
            device,
            tags,
            abs_tolerance,
            rel_tolerance,
        } => {
            let def = backend.get_tags().await?;
            let pv = backend
                .add_pv(NewPv {
                    setpoint,
                    readback,
                    description,
                    device,
                    tags: parse_tags(&def, &tags)?,
                    abs_tolerance,
                    rel_tolerance,
                    ..NewPv::default()
                })
                .await?;
            print_saved("Added", &pv);
        },
        PvCommands::Update {
            id,
            setpoint,
            description,
            device,
            tags,
            abs_tolerance,
            rel_tolerance,
        } => {
            let tags = if tags.is_empty() {
                None
            } else {
                Some(parse_tags(&backend.get_tags().await?, &tags)?)
            };
            let update = PvUpdate {
                setpoint,
                description,
                device,
                tags,
                abs_tolerance,
                rel_tolerance,
            };
            if update.is_empty() {
                bail!("Nothing to update");
            }
            let pv = backend.update_pv(id, update).await?;
            print_saved("Updated", &pv);
        },
        PvCommands::Archive { id } => {
            backend.archive_pv(id).await?;
            println!("{} Archived {}", "OK".green(), id.to_string().bright_yellow());
        },
    }
    Ok(())
}

fn print_saved(action: &str, pv: &Pv) {
    println!(
        "{} {} {} ({})",
        "OK".green(),
        action,
        pv.display_address().bright_yellow(),
        pv.uuid
    );
}

/// Resolve `GROUP=TAG` arguments against the tag definition
pub fn parse_tags(def: &TagDef, raw: &[String]) -> Result<TagSet> {
    let mut set = TagSet::new();
    for item in raw {
        let Some((group, tag)) = item.split_once('=') else {
            bail!("Tag '{}' must be written GROUP=TAG", item);
        };
        let (group_id, ids) = tags::resolve_names(def, group.trim(), &[tag.trim()])?;
        set.entry(group_id).or_default().extend(ids);
    }
    Ok(set)
}
