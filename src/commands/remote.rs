//! Remote command handlers - configuring the git remote used for sync.

use super::{AppContext, humanize_timestamp, prompt_secret};
use crate::cli::RemoteCommands;
use crate::error::Result;
use crate::settings::{SYNC_TIME_FORMAT, SyncSettings};
use crate::utils::{mask_secret, redact_url};

/// Handle remote subcommands
pub fn handle_remote(ctx: &AppContext, command: RemoteCommands) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    match command {
        RemoteCommands::Setup {
            repo,
            token,
            branch,
            auto_sync,
        } => {
            let token = match token {
                Some(t) => t,
                None => prompt_secret("Access token: ")?,
            };
            orchestrator.setup(&repo, &token, &branch, auto_sync)?;
            println!("Remote configured: {} (branch {})", redact_url(&repo), branch);
            if auto_sync {
                println!("Auto-sync is on: backups will be pushed after each run.");
            }
        }
        RemoteCommands::Reset => {
            orchestrator.reset()?;
            println!("Remote configuration cleared.");
        }
        RemoteCommands::Status => {
            let settings = orchestrator.settings();
            println!("Backup root: {}", orchestrator.root().display());
            println!(
                "Repository:  {}",
                if orchestrator.is_initialized() {
                    "initialized"
                } else {
                    "not initialized"
                }
            );
            if !settings.configured {
                println!("Remote:      (not configured)");
                println!();
                println!("Run 'switchback remote setup <URL>' to configure one.");
                return Ok(());
            }
            for line in remote_summary(&settings) {
                println!("{}", line);
            }
            match &settings.last_sync {
                Some(at) => println!(
                    "Last sync:   {} ({})",
                    at,
                    humanize_timestamp(at, SYNC_TIME_FORMAT)
                ),
                None => println!("Last sync:   never"),
            }
        }
    }
    Ok(())
}

/// Status lines for a configured remote. The URL is redacted and the token
/// masked, so nothing printed here can leak a credential.
fn remote_summary(settings: &SyncSettings) -> Vec<String> {
    vec![
        format!("Remote:      {}", redact_url(&settings.repo)),
        format!("Branch:      {}", settings.branch()),
        format!("Token:       {}", mask_secret(&settings.token)),
        format!(
            "Auto-sync:   {}",
            if settings.auto_sync { "on" } else { "off" }
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_summary_hides_credentials() {
        let settings = SyncSettings {
            configured: true,
            repo: "https://ghp_pasted@github.com/acme/configs.git".into(),
            token: "ghp_stored".into(),
            ..Default::default()
        };
        let summary = remote_summary(&settings).join("\n");
        assert!(!summary.contains("ghp_"));
        assert!(summary.contains("Remote:      https://***@github.com/acme/configs.git"));
        assert!(summary.contains("Token:       **********"));
        assert!(summary.contains("Branch:      main"));
    }
}
