//! Credential handlers - stored credentials are encrypted at rest.

use super::{AppContext, prompt_secret};
use crate::cli::CredentialCommands;
use crate::db::CredentialUpdate;
use crate::error::Result;
use crate::utils::mask_secret;

/// Handle credential subcommands
pub fn handle_credential(ctx: &AppContext, command: CredentialCommands) -> Result<()> {
    let inventory = ctx.inventory()?;
    match command {
        CredentialCommands::List => {
            let creds = inventory.list_credentials();
            let templates = ctx.config.credential_templates();
            if creds.is_empty() && templates.is_empty() {
                println!("No credentials. Use 'switchback credential add' to store one.");
                return Ok(());
            }

            if !creds.is_empty() {
                println!("Stored credentials:");
                for c in &creds {
                    println!(
                        "  {}  {:<20} {:<16} {:<8} {}",
                        c.id,
                        c.name,
                        c.username,
                        mask_secret(&c.password),
                        c.created_at.as_deref().unwrap_or("")
                    );
                }
            }
            if !templates.is_empty() {
                if !creds.is_empty() {
                    println!();
                }
                println!("Config templates:");
                for t in &templates {
                    println!(
                        "  {:<20} {:<20} {:<16} {}",
                        t.id,
                        t.name,
                        t.username,
                        mask_secret(&t.password)
                    );
                }
            }
        }
        CredentialCommands::Add {
            name,
            username,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_secret(&format!("Password for {}: ", username))?,
            };
            let id = inventory.create_credential(&name, &username, &password)?;
            println!("Stored credential '{}' as {}", name, id);
        }
        CredentialCommands::Edit {
            id,
            name,
            username,
            password,
        } => {
            let password = if password {
                Some(prompt_secret("New password: ")?)
            } else {
                None
            };
            inventory.update_credential(
                &id,
                CredentialUpdate {
                    name,
                    username,
                    password,
                },
            )?;
            println!("Updated credential {}", id);
        }
        CredentialCommands::Remove { id } => {
            inventory.delete_credential(&id)?;
            println!("Deleted credential {}", id);
        }
        CredentialCommands::Import => {
            let templates = ctx.config.credential_templates();
            if templates.is_empty() {
                println!("No credential templates in the config file.");
                return Ok(());
            }
            let existing = inventory.list_credentials();
            let mut added = 0;
            for t in &templates {
                if existing
                    .iter()
                    .any(|c| c.name == t.name && c.username == t.username)
                {
                    continue;
                }
                let id = inventory.create_credential(&t.name, &t.username, &t.password)?;
                println!("  {} -> {}", t.id, id);
                added += 1;
            }
            println!(
                "Imported {} of {} template(s). Switches referencing template IDs keep using the config file.",
                added,
                templates.len()
            );
        }
    }
    Ok(())
}
