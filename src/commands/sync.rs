//! Sync command handler - commit and push the backup tree.

use super::AppContext;
use crate::error::Result;
use crate::vcs::SyncOutcome;

/// Handle `switchback sync`
pub fn handle_sync(ctx: &AppContext, message: Option<String>) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    match orchestrator.sync_exclusive(message.as_deref())? {
        SyncOutcome::Pushed => println!("Pushed backups to remote."),
        SyncOutcome::NoChanges => println!("No changes to sync."),
    }
    Ok(())
}
