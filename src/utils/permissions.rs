//! File permission utilities for restricting access to sensitive files.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{BackupError, Result};

/// Set restrictive permissions (owner-only read/write) on a file.
///
/// On Unix systems this sets mode 0o600. On other platforms this is a no-op
/// since the permission model differs.
pub fn restrict_file_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms).map_err(|e| {
            BackupError::storage(format!(
                "failed to set permissions on {}: {}",
                path.display(),
                e
            ))
        })?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Mode for files holding secrets: owner read/write only.
pub const OWNER_ONLY_MODE: u32 = 0o600;

/// Open `path` for reading and writing without truncating it.
///
/// A missing file is created with `mode` on Unix, so its contents are never
/// visible under the default umask. An existing file keeps its permissions.
pub fn open_for_update(path: &Path, mode: Option<u32>) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if let Some(mode) = mode {
            options.mode(mode);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = mode;
    }

    options.open(path)
}

/// Check whether the current process can create files in `dir`.
///
/// Creates and removes a uniquely named file, which also covers read-only
/// mounts and ACLs that mode bits alone don't reveal.
pub fn is_dir_writable(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let marker = dir.join(format!(".switchback-write-test-{}", std::process::id()));
    match OpenOptions::new().write(true).create_new(true).open(&marker) {
        Ok(_) => {
            let _ = std::fs::remove_file(&marker);
            true
        }
        Err(_) => false,
    }
}
