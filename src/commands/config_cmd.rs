//! Config command handlers - inspecting and generating configuration.

use std::path::{Path, PathBuf};

use super::AppContext;
use crate::cli::ConfigCommands;
use crate::config::Config;
use crate::error::Result;
use crate::utils::is_dir_writable;

/// Handle config subcommands; no subcommand shows the effective config.
pub fn handle_config(ctx: &AppContext, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        Some(ConfigCommands::Init { path, overwrite }) => {
            let config_path = Config::generate_config_file(path, overwrite)?;
            println!("Config file generated at: {}", config_path.display());
        }
        Some(ConfigCommands::Show) | None => show(ctx),
        Some(ConfigCommands::Check) => check(ctx)?,
    }
    Ok(())
}

fn show(ctx: &AppContext) {
    let config = &ctx.config;
    println!("Current Configuration:");
    match &ctx.config_path {
        Some(path) => println!("  file: {}", path.display()),
        None => println!("  file: (none found, using defaults)"),
    }
    let dir_or_default = |dir: Option<PathBuf>| {
        dir.map(|d| d.display().to_string())
            .unwrap_or_else(|| "(automatic)".to_string())
    };
    println!("  data_dir: {}", dir_or_default(config.data_dir()));
    println!("  backup_dir: {}", dir_or_default(config.backup_dir()));
    println!("  retention: {}", config.retention());
    println!("  fetch_timeout: {}s", config.fetch_timeout().as_secs());
    println!("  ssh_port: {}", config.ssh_port());
    println!();

    if config.templates.is_empty() {
        println!("Templates: (none configured)");
    } else {
        println!("Templates:");
        for t in &config.templates {
            println!(
                "  {} ({}) user={}",
                t.id,
                t.name.as_deref().unwrap_or("-"),
                t.username
            );
        }
    }

    if config.switches.is_empty() {
        println!("Switches: (none configured)");
    } else {
        println!("Switches:");
        for s in &config.switches {
            print!("  {}", s.address);
            if let Some(name) = &s.name {
                print!(" name={}", name);
            }
            if let Some(credential) = &s.credential {
                print!(" credential={}", credential);
            }
            println!();
        }
    }
}

fn check(ctx: &AppContext) -> Result<()> {
    let data_dir = ctx.data_dir()?;
    let backup_root = ctx.backup_root()?;
    println!(
        "Data directory:   {} ({})",
        data_dir.display(),
        writable_label(&data_dir)
    );
    println!(
        "Backup root:      {} ({})",
        backup_root.display(),
        writable_label(&backup_root)
    );

    let inventory = ctx.inventory()?;
    inventory.secrets().self_test()?;
    println!("Encryption:       OK ({})", inventory.secrets().key_path().display());
    println!(
        "Inventory:        {} switch(es), {} credential(s), {} user(s)",
        inventory.list_switches().len(),
        inventory.list_credentials().len(),
        inventory.list_users().len()
    );
    Ok(())
}

fn writable_label(dir: &Path) -> &'static str {
    if is_dir_writable(dir) {
        "writable"
    } else {
        "NOT writable"
    }
}
