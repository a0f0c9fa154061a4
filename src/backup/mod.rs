//! Backup writer: timestamped snapshots per switch with retention.

mod retention;
mod storage;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::error::{BackupError, Result};

pub use retention::apply_retention;
pub use storage::{
    CONFIGS_DIR, SNAPSHOT_SUFFIX, compute_content_hash, render_snapshot, sanitize_key,
    strip_header,
};

/// Default number of snapshots kept per switch.
pub const DEFAULT_RETENTION: i64 = 30;

const MAX_NAME_ATTEMPTS: u32 = 100;

/// Metadata about one snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub file_name: String,
    pub path: PathBuf,
    /// Timestamp label from the file name, e.g. `2024-03-09_14-05-07`.
    pub timestamp: String,
    /// Capture time parsed from the file name, if it parses.
    pub taken_at: Option<DateTime<Local>>,
    pub modified: DateTime<Local>,
    pub size: u64,
}

/// Result of writing one snapshot.
#[derive(Debug, Clone)]
pub struct SavedSnapshot {
    pub path: PathBuf,
    /// False when the configuration body is identical to the previous
    /// latest snapshot.
    pub changed: bool,
    /// Snapshots removed by retention afterwards.
    pub pruned: usize,
}

/// Writes snapshots under `<root>/configs/<sanitized key>/`.
#[derive(Debug, Clone)]
pub struct BackupWriter {
    root: PathBuf,
    retention: i64,
}

impl BackupWriter {
    pub fn new(root: impl Into<PathBuf>, retention: i64) -> Self {
        Self {
            root: root.into(),
            retention,
        }
    }

    /// The backup root (also the git working tree).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retention(&self) -> i64 {
        self.retention
    }

    /// Directory holding snapshots for `switch_key`.
    pub fn switch_dir(&self, switch_key: &str) -> PathBuf {
        self.root.join(CONFIGS_DIR).join(sanitize_key(switch_key))
    }

    /// Save a snapshot taken now, then apply retention.
    pub fn save(&self, switch_key: &str, switch_name: &str, config: &[u8]) -> Result<SavedSnapshot> {
        self.save_at(switch_key, switch_name, config, Local::now())
    }

    /// Save a snapshot with an explicit capture time.
    pub fn save_at(
        &self,
        switch_key: &str,
        switch_name: &str,
        config: &[u8],
        at: DateTime<Local>,
    ) -> Result<SavedSnapshot> {
        let dir = self.switch_dir(switch_key);
        fs::create_dir_all(&dir).map_err(|e| {
            BackupError::write_failed(format!(
                "failed to create backup directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let changed = self.differs_from_latest(switch_key, config);

        let content = render_snapshot(&at, switch_name, switch_key, config);
        let path = write_new(&dir, &at, &content)?;
        info!(switch = %switch_key, path = %path.display(), changed, "saved snapshot");

        let pruned = apply_retention(&dir, self.retention);
        if pruned > 0 {
            debug!(switch = %switch_key, pruned, "applied retention");
        }

        Ok(SavedSnapshot {
            path,
            changed,
            pruned,
        })
    }

    /// Whether `config` differs from the newest existing snapshot body.
    ///
    /// Only informational: a snapshot that can't be listed or read counts as
    /// changed and never blocks the save.
    fn differs_from_latest(&self, switch_key: &str, config: &[u8]) -> bool {
        let latest = match self.latest_backup(switch_key) {
            Ok(Some(latest)) => latest,
            Ok(None) => return true,
            Err(e) => {
                warn!(switch = %switch_key, error = %e, "cannot list previous snapshots");
                return true;
            }
        };
        match fs::read(&latest.path) {
            Ok(previous) => {
                compute_content_hash(strip_header(&previous)) != compute_content_hash(config)
            }
            Err(e) => {
                warn!(path = %latest.path.display(), error = %e, "cannot read previous snapshot");
                true
            }
        }
    }

    /// Apply the configured retention to one switch directory.
    pub fn apply_retention(&self, switch_dir: &Path) -> usize {
        apply_retention(switch_dir, self.retention)
    }

    /// All snapshots for a switch, newest first.
    pub fn list_backups(&self, switch_key: &str) -> Result<Vec<Snapshot>> {
        let files = retention::snapshot_files_oldest_first(&self.switch_dir(switch_key))?;
        let mut snapshots = Vec::with_capacity(files.len());
        for (path, modified) in files.into_iter().rev() {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            snapshots.push(Snapshot {
                timestamp: storage::timestamp_label(&file_name).to_string(),
                taken_at: storage::parse_snapshot_time(&file_name),
                modified: DateTime::<Local>::from(modified),
                size,
                file_name,
                path,
            });
        }
        Ok(snapshots)
    }

    /// The newest snapshot for a switch, if any.
    pub fn latest_backup(&self, switch_key: &str) -> Result<Option<Snapshot>> {
        Ok(self.list_backups(switch_key)?.into_iter().next())
    }

    /// Read a snapshot and return the configuration body without its header.
    pub fn read_snapshot(&self, path: &Path) -> Result<Vec<u8>> {
        let content = fs::read(path)?;
        Ok(strip_header(&content).to_vec())
    }
}

/// Write `content` to a fresh file in `dir`, never overwriting an existing
/// snapshot.
fn write_new(dir: &Path, at: &DateTime<Local>, content: &[u8]) -> Result<PathBuf> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(storage::snapshot_filename(at, attempt));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(BackupError::write_failed(format!(
                    "failed to create {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        file.write_all(content)
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                BackupError::write_failed(format!("failed to write {}: {}", path.display(), e))
            })?;
        return Ok(path);
    }
    Err(BackupError::write_failed(format!(
        "too many snapshots for {} in one second",
        dir.display()
    )))
}
