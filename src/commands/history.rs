//! History and show handlers - browsing stored snapshots.

use std::io::{self, Write};

use chrono_humanize::HumanTime;

use super::AppContext;
use crate::error::{BackupError, Result};

/// Handle `switchback history` - list snapshots for a switch, newest first
pub fn handle_history(
    ctx: &AppContext,
    address: &str,
    limit: Option<usize>,
    verbose: bool,
) -> Result<()> {
    let writer = ctx.writer()?;
    let snapshots = writer.list_backups(address)?;

    if snapshots.is_empty() {
        println!("No backups for {}. Use 'switchback backup' first.", address);
        return Ok(());
    }

    println!("\n{}", address);
    println!("{}", "-".repeat(address.len().min(60)));

    let shown = limit.unwrap_or(snapshots.len());
    for (i, snapshot) in snapshots.iter().take(shown).enumerate() {
        let at = snapshot.taken_at.unwrap_or(snapshot.modified);
        let marker = if i == 0 { " (latest)" } else { "" };
        println!(
            "  {}  {}{}",
            snapshot.timestamp,
            HumanTime::from(at),
            marker
        );
        if verbose {
            println!("      {} ({} bytes)", snapshot.path.display(), snapshot.size);
        }
    }

    if snapshots.len() > shown {
        println!("  ... {} older", snapshots.len() - shown);
    }
    Ok(())
}

/// Handle `switchback show` - print the latest snapshot for a switch
pub fn handle_show(ctx: &AppContext, address: &str) -> Result<()> {
    let writer = ctx.writer()?;
    let latest = writer
        .latest_backup(address)?
        .ok_or_else(|| BackupError::not_found(format!("no backups for {}", address)))?;

    let content = std::fs::read(&latest.path)?;
    let mut out = io::stdout().lock();
    out.write_all(&content)?;
    if !content.ends_with(b"\n") {
        writeln!(out)?;
    }
    Ok(())
}
