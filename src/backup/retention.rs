//! Retention: keep the N newest snapshots per switch.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::storage::is_snapshot_file;
use crate::error::Result;

/// Snapshot files in `dir` with their modification times, oldest first.
///
/// Entries are ordered by name before the stable sort on mtime, so equal
/// modification times always break the same way.
pub(crate) fn snapshot_files_oldest_first(dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_snapshot = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_snapshot_file);
        if !is_snapshot || !path.is_file() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((path, modified));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    files.sort_by_key(|(_, modified)| *modified);
    Ok(files)
}

/// Delete the oldest snapshots in `dir` until `keep` remain.
///
/// `keep <= 0` means unlimited. Files that can't be deleted are logged and
/// skipped. Returns how many files were removed.
pub fn apply_retention(dir: &Path, keep: i64) -> usize {
    if keep <= 0 {
        return 0;
    }

    let files = match snapshot_files_oldest_first(dir) {
        Ok(f) => f,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list snapshots for retention");
            return 0;
        }
    };

    let keep = keep as usize;
    if files.len() <= keep {
        return 0;
    }

    let excess = files.len() - keep;
    let mut removed = 0;
    for (path, _) in files.into_iter().take(excess) {
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "pruned snapshot");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to prune snapshot"),
        }
    }
    removed
}
