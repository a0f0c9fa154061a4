//! Sync settings persisted as `backup_settings.json` in the backup root.
//!
//! The file holds the remote token, so it is written owner-only and kept out
//! of version control by the generated `.gitignore`.

use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::db::JsonStore;
use crate::error::Result;
use crate::utils::{OWNER_ONLY_MODE, restrict_file_permissions};

/// Settings file name inside the backup root.
pub const SETTINGS_FILE: &str = "backup_settings.json";

/// Format used for `last_sync`.
pub const SYNC_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Remote repository settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    #[serde(rename = "github_configured")]
    pub configured: bool,
    #[serde(rename = "github_repo")]
    pub repo: String,
    #[serde(rename = "github_token")]
    pub token: String,
    #[serde(rename = "github_branch")]
    pub branch: String,
    pub auto_sync: bool,
    pub last_sync: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            configured: false,
            repo: String::new(),
            token: String::new(),
            branch: "main".to_string(),
            auto_sync: false,
            last_sync: None,
        }
    }
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSettings")
            .field("configured", &self.configured)
            .field("repo", &self.repo)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("branch", &self.branch)
            .field("auto_sync", &self.auto_sync)
            .field("last_sync", &self.last_sync)
            .finish()
    }
}

impl SyncSettings {
    /// Branch to push, defaulting to `main` when blank.
    pub fn branch(&self) -> &str {
        if self.branch.trim().is_empty() {
            "main"
        } else {
            &self.branch
        }
    }

    /// Record a successful sync at the current local time.
    pub fn touch_last_sync(&mut self) {
        self.last_sync = Some(Local::now().format(SYNC_TIME_FORMAT).to_string());
    }
}

/// Reads and writes [`SyncSettings`] under file locks.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    store: JsonStore,
}

impl SettingsStore {
    pub fn new(backup_root: &Path) -> Self {
        Self {
            store: JsonStore::new(backup_root),
        }
    }

    /// Current settings, or defaults if the file is missing or unreadable.
    pub fn load(&self) -> SyncSettings {
        self.store.read(SETTINGS_FILE, SyncSettings::default())
    }

    /// Persist settings with owner-only permissions. A new file is created
    /// at 0600; an existing one is tightened after the write.
    pub fn save(&self, settings: &SyncSettings) -> Result<()> {
        self.store
            .write_with_mode(SETTINGS_FILE, settings, Some(OWNER_ONLY_MODE))?;
        restrict_file_permissions(&self.store.path(SETTINGS_FILE))
    }
}
