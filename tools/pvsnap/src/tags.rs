//! `pvsnap tags` - tag group management

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use pvsnap_backend::Backend;
use pvsnap_client::Client;
use pvsnap_model::{TagGroupId, TagId};

#[derive(Subcommand)]
pub enum TagCommands {
    /// List tag groups and their tags
    List,

    /// Create a tag group
    AddGroup {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Rename and/or re-describe a tag group
    RenameGroup {
        group: TagGroupId,
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a tag group
    DeleteGroup { group: TagGroupId },

    /// Add a tag to a group
    Add {
        group: TagGroupId,
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Rename a tag
    Rename {
        group: TagGroupId,
        tag: TagId,
        name: String,
    },

    /// Remove a tag from a group
    Delete { group: TagGroupId, tag: TagId },
}

pub async fn handle_command(cmd: TagCommands, client: &Client) -> Result<()> {
    let backend = client.backend();
    match cmd {
        TagCommands::List => {
            let def = backend.get_tags().await?;
            if def.is_empty() {
                println!("{}", "No tag groups".dimmed());
            }
            for (id, group) in &def {
                println!(
                    "{} {}  {}",
                    format!("[{}]", id).bright_black(),
                    group.name.bold(),
                    group.description.dimmed()
                );
                for (tag_id, name) in &group.tags {
                    println!("    {} {}", format!("{:>3}", tag_id).bright_black(), name);
                }
            }
        },
        TagCommands::AddGroup { name, description } => {
            let id = backend.add_tag_group(&name, &description).await?;
            println!("{} Created tag group {} ({})", "OK".green(), name.bright_yellow(), id);
        },
        TagCommands::RenameGroup {
            group,
            name,
            description,
        } => {
            if name.is_none() && description.is_none() {
                anyhow::bail!("Give a new name and/or --description");
            }
            backend
                .update_tag_group(group, name.as_deref(), description.as_deref())
                .await?;
            println!("{} Updated tag group {}", "OK".green(), group);
        },
        TagCommands::DeleteGroup { group } => {
            backend.delete_tag_group(group).await?;
            println!("{} Deleted tag group {}", "OK".green(), group);
        },
        TagCommands::Add {
            group,
            name,
            description,
        } => {
            let id = backend.add_tag_to_group(group, &name, &description).await?;
            println!(
                "{} Added tag {} ({}) to group {}",
                "OK".green(),
                name.bright_yellow(),
                id,
                group
            );
        },
        TagCommands::Rename { group, tag, name } => {
            backend.update_tag_in_group(group, tag, Some(&name)).await?;
            println!("{} Renamed tag {}/{} to {}", "OK".green(), group, tag, name);
        },
        TagCommands::Delete { group, tag } => {
            backend.delete_tag_from_group(group, tag).await?;
            println!("{} Deleted tag {}/{}", "OK".green(), group, tag);
        },
    }
    Ok(())
}
