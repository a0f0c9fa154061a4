//! Backup command handler - fetch and save running configurations.

use std::io::{self, Write};

use chrono::Local;

use super::{AppContext, prompt_secret};
use crate::batch::{BatchReport, BatchRunner, ProgressEvent};
use crate::credentials::LoginCredentials;
use crate::error::Result;
use crate::fetch::ConfigFetcher;
use crate::vcs::SyncOutcome;

/// Handle `switchback backup`. Returns whether every switch succeeded.
pub fn handle_backup(
    ctx: &AppContext,
    switch: Option<String>,
    sync: bool,
    login: Option<String>,
) -> Result<bool> {
    let session = match login {
        Some(username) => {
            let password = prompt_secret(&format!("Password for {}: ", username))?;
            Some(LoginCredentials::session(username, password))
        }
        None => None,
    };

    let runner = BatchRunner::new(
        ctx.inventory()?,
        ConfigFetcher::ssh(ctx.config.fetch_options()),
        ctx.writer()?,
    )
    .with_templates(ctx.config.credential_templates())
    .with_session(session)
    .with_sync(ctx.orchestrator()?)
    .sync_requested(sync);

    let quiet = ctx.quiet;
    output(quiet, "Starting config backup...")?;
    let progress = |event: &ProgressEvent<'_>| report_progress(quiet, event);
    let report = match &switch {
        Some(address) => runner.run_one_with(address, progress)?,
        None => runner.run_all_with(progress),
    };

    print_summary(quiet, &report, sync)?;
    Ok(report.all_succeeded())
}

fn output(quiet: bool, message: &str) -> Result<()> {
    if !quiet {
        let mut out = io::stdout().lock();
        if message.is_empty() {
            writeln!(out)?;
        } else {
            writeln!(out, "[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message)?;
        }
    }
    Ok(())
}

fn report_progress(quiet: bool, event: &ProgressEvent<'_>) -> Result<()> {
    match event {
        ProgressEvent::Starting { switch, .. } => output(
            quiet,
            &format!("Backing up: {} ({})", switch.display_name(), switch.address),
        ),
        ProgressEvent::Succeeded { saved, .. } => {
            let file = saved
                .path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let note = if saved.changed { "" } else { " (unchanged)" };
            output(quiet, &format!("  OK: Saved to {}{}", file, note))
        }
        ProgressEvent::Failed { error, .. } => output(quiet, &format!("  FAIL: {}", error)),
    }
}

fn print_summary(quiet: bool, report: &BatchReport, sync_requested: bool) -> Result<()> {
    output(quiet, "")?;
    output(
        quiet,
        &format!(
            "Backup complete: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        ),
    )?;

    match &report.sync {
        None if sync_requested => output(quiet, "Sync: SKIP, no remote configured")?,
        None => {}
        Some(Ok(SyncOutcome::Pushed)) => output(quiet, "Sync: OK, pushed to remote")?,
        Some(Ok(SyncOutcome::NoChanges)) => output(quiet, "Sync: OK, no changes to sync")?,
        // Sync failures go to stderr even in quiet mode.
        Some(Err(e)) => eprintln!("Sync failed: {}", e),
    }
    Ok(())
}
