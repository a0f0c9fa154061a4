//! Where the data directory and backup root live.
//!
//! Prefer a fixed system-wide directory when it exists and is writable (or
//! can be created because its parent is writable). Otherwise fall back to a
//! directory next to the executable. The answer is computed once per process
//! and cached.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{debug, info};

use crate::error::{BackupError, Result};
use crate::utils::is_dir_writable;

/// System-wide data directory.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/switchback/data";

/// System-wide backup root.
pub const SYSTEM_BACKUP_DIR: &str = "/var/lib/switchback/backups";

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
static BACKUP_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Resolve a directory using the system-then-fallback policy.
///
/// This does not cache; see [`data_dir`] and [`backup_root`] for the
/// process-wide values.
pub fn resolve_dir(system: &Path, fallback: &Path) -> Result<PathBuf> {
    if system.is_dir() {
        if is_dir_writable(system) {
            return Ok(system.to_path_buf());
        }
        debug!(path = %system.display(), "system directory is not writable");
    } else if let Some(parent) = system.parent()
        && is_dir_writable(parent)
        && std::fs::create_dir_all(system).is_ok()
    {
        info!(path = %system.display(), "created system directory");
        return Ok(system.to_path_buf());
    }

    std::fs::create_dir_all(fallback).map_err(|e| {
        BackupError::storage(format!(
            "cannot create {} (and {} is unavailable): {}",
            fallback.display(),
            system.display(),
            e
        ))
    })?;
    if !is_dir_writable(fallback) {
        return Err(BackupError::storage(format!(
            "{} is not writable",
            fallback.display()
        )));
    }
    Ok(fallback.to_path_buf())
}

fn exe_relative(name: &str) -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| BackupError::storage(format!("cannot locate executable: {}", e)))?;
    let dir = exe
        .parent()
        .ok_or_else(|| BackupError::storage("executable has no parent directory"))?;
    Ok(dir.join(name))
}

fn cached(cell: &'static OnceLock<PathBuf>, system: &str, fallback: &str) -> Result<PathBuf> {
    if let Some(dir) = cell.get() {
        return Ok(dir.clone());
    }
    let resolved = resolve_dir(Path::new(system), &exe_relative(fallback)?)?;
    Ok(cell.get_or_init(|| resolved).clone())
}

/// Process-wide data directory (credentials, switches, users, key file).
pub fn data_dir() -> Result<PathBuf> {
    cached(&DATA_DIR, SYSTEM_DATA_DIR, "data")
}

/// Process-wide backup root (snapshots, sync settings, git working tree).
pub fn backup_root() -> Result<PathBuf> {
    cached(&BACKUP_DIR, SYSTEM_BACKUP_DIR, "backups")
}
