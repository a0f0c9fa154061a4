//! Advisory lock serializing syncs against one backup root.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{BackupError, Result};

/// Lock file name inside the backup root.
pub const SYNC_LOCK_FILE: &str = ".sync.lock";

/// Held for the duration of a sync; released on drop.
#[derive(Debug)]
pub struct SyncLock {
    file: File,
    path: PathBuf,
}

impl SyncLock {
    /// Take the lock without waiting. Fails with `SyncInProgress` if another
    /// process (or another handle in this one) holds it.
    pub fn try_acquire(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            BackupError::storage(format!("cannot create {}: {}", root.display(), e))
        })?;
        let path = root.join(SYNC_LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!(path = %path.display(), "acquired sync lock");
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(BackupError::SyncInProgress)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
