//! Switch inventory handlers.

use super::AppContext;
use crate::cli::SwitchCommands;
use crate::db::{Inventory, Switch, SwitchUpdate};
use crate::error::Result;

/// Handle switch subcommands
pub fn handle_switch(ctx: &AppContext, command: SwitchCommands) -> Result<()> {
    let inventory = ctx.inventory()?;
    match command {
        SwitchCommands::List => {
            let switches = inventory.list_switches();
            if switches.is_empty() {
                println!("No switches. Use 'switchback switch add' or list them in the config file.");
                return Ok(());
            }
            println!("{:<20} {:<24} {:<12} CREDENTIAL", "ADDRESS", "NAME", "GROUP");
            for s in &switches {
                println!(
                    "{:<20} {:<24} {:<12} {}",
                    s.address,
                    s.name,
                    s.group,
                    s.credential.as_deref().unwrap_or("-")
                );
            }
        }
        SwitchCommands::Add {
            address,
            name,
            group,
            credential,
        } => {
            let switch = Switch {
                address: address.trim().to_string(),
                name,
                group,
                credential: credential.filter(|c| !c.is_empty()),
            };
            warn_unknown_credential(ctx, &inventory, switch.credential.as_deref());
            let label = format!("{} ({})", switch.display_name(), switch.address);
            inventory.create_switch(switch)?;
            println!("Added switch {}", label);
        }
        SwitchCommands::Edit {
            address,
            new_address,
            name,
            group,
            credential,
            clear_credential,
        } => {
            warn_unknown_credential(ctx, &inventory, credential.as_deref());
            let credential = if clear_credential {
                Some(None)
            } else {
                credential.map(Some)
            };
            inventory.update_switch(
                &address,
                SwitchUpdate {
                    address: new_address,
                    name,
                    group,
                    credential,
                },
            )?;
            println!("Updated switch {}", address);
        }
        SwitchCommands::Remove { address } => {
            inventory.delete_switch(&address)?;
            println!("Removed switch {} (existing backups are kept)", address);
        }
        SwitchCommands::Import => {
            let switches = ctx.config.fallback_switches();
            if switches.is_empty() {
                println!("No switches in the config file.");
                return Ok(());
            }
            let added = inventory.import_switches(&switches)?;
            println!(
                "Imported {} of {} switch(es) from the config file.",
                added,
                switches.len()
            );
        }
    }
    Ok(())
}

fn warn_unknown_credential(ctx: &AppContext, inventory: &Inventory, credential: Option<&str>) {
    if let Some(id) = credential
        && inventory.get_credential(id).is_none()
        && ctx.config.template(id).is_none()
    {
        eprintln!("Warning: no stored credential or template with ID '{}'", id);
    }
}
