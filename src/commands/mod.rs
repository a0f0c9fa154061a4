//! Command handlers for the switchback CLI.
//!
//! Each handler takes the [`AppContext`] plus its parsed arguments. Storage
//! directories are resolved lazily so commands such as `config init` work
//! before any data directory exists.

mod backup;
mod config_cmd;
mod credentials;
mod history;
mod remote;
mod switches;
mod sync;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeZone};
use chrono_humanize::HumanTime;

use crate::backup::BackupWriter;
use crate::config::Config;
use crate::db::{Inventory, JsonStore, location};
use crate::error::{BackupError, Result};
use crate::vcs::{GitCli, SyncOrchestrator};

pub use backup::handle_backup;
pub use config_cmd::handle_config;
pub use credentials::handle_credential;
pub use history::{handle_history, handle_show};
pub use remote::handle_remote;
pub use switches::handle_switch;
pub use sync::handle_sync;

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub quiet: bool,
}

impl AppContext {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
            quiet: false,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Data directory: configured, or the system/exe fallback.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match self.config.data_dir() {
            Some(dir) => ensure_dir(&dir),
            None => location::data_dir(),
        }
    }

    /// Backup root: configured, or the system/exe fallback.
    pub fn backup_root(&self) -> Result<PathBuf> {
        match self.config.backup_dir() {
            Some(dir) => ensure_dir(&dir),
            None => location::backup_root(),
        }
    }

    /// Datastore-backed inventory, falling back to config switches.
    pub fn inventory(&self) -> Result<Inventory> {
        let store = JsonStore::new(self.data_dir()?);
        Ok(Inventory::new(store).with_fallback_switches(self.config.fallback_switches()))
    }

    pub fn writer(&self) -> Result<BackupWriter> {
        Ok(BackupWriter::new(self.backup_root()?, self.config.retention()))
    }

    pub fn orchestrator(&self) -> Result<SyncOrchestrator<GitCli>> {
        let root = self.backup_root()?;
        Ok(SyncOrchestrator::new(&root, GitCli::new(&root)))
    }
}

fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| BackupError::storage(format!("cannot create {}: {}", dir.display(), e)))?;
    Ok(dir.to_path_buf())
}

/// "3 hours ago" style age for a stored `YYYY-mm-dd HH:MM:SS` timestamp.
/// Unparseable input is returned unchanged.
pub(crate) fn humanize_timestamp(value: &str, format: &str) -> String {
    NaiveDateTime::parse_from_str(value, format)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).single())
        .map(|at| HumanTime::from(at).to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Read a secret from the terminal without echo.
pub(crate) fn prompt_secret(prompt: &str) -> Result<String> {
    let value = rpassword::prompt_password(prompt)?;
    if value.is_empty() {
        return Err(BackupError::validation("value cannot be empty"));
    }
    Ok(value)
}
