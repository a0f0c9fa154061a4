//! Locked JSON record files.
//!
//! Every collection is one pretty-printed JSON file. Readers take a shared
//! `flock` and buffer the whole file before releasing it; writers take an
//! exclusive lock, truncate, write, and fsync before releasing. Multiple
//! processes touch these files, so this lock discipline is the only thing
//! keeping readers from observing a half-written document.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::error::{BackupError, Result};
use crate::utils::open_for_update;

/// A directory of JSON collections guarded by file locks.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the collection files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a collection file.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Read a collection, returning `default` when the file is missing,
    /// unreadable, or does not parse.
    pub fn read<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        let path = self.path(name);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => return default,
        };

        let content = match read_locked(&mut file) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read collection");
                return default;
            }
        };

        match serde_json::from_slice(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "collection is not valid JSON");
                default
            }
        }
    }

    /// Replace a collection with `records`.
    pub fn write<T: Serialize + ?Sized>(&self, name: &str, records: &T) -> Result<()> {
        self.write_with_mode(name, records, None)
    }

    /// Like [`write`](Self::write), but a missing file is created with
    /// `mode` (Unix permission bits) instead of the umask default.
    pub fn write_with_mode<T: Serialize + ?Sized>(
        &self,
        name: &str,
        records: &T,
        mode: Option<u32>,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            BackupError::storage(format!(
                "cannot create data directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let json = serde_json::to_vec_pretty(records)?;
        let path = self.path(name);

        // Truncation happens only after the lock is held
        let mut file = open_for_update(&path, mode).map_err(|e| {
            BackupError::storage(format!("cannot open {} for writing: {}", path.display(), e))
        })?;

        fs2::FileExt::lock_exclusive(&file)?;
        let result = write_truncated(&mut file, &json);
        fs2::FileExt::unlock(&file)?;
        result?;

        debug!(path = %path.display(), bytes = json.len(), "wrote collection");
        Ok(())
    }
}

fn read_locked(file: &mut File) -> std::io::Result<Vec<u8>> {
    fs2::FileExt::lock_shared(&*file)?;
    let mut content = Vec::new();
    let result = file.read_to_end(&mut content);
    fs2::FileExt::unlock(&*file)?;
    result.map(|_| content)
}

fn write_truncated(file: &mut File, content: &[u8]) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(content)?;
    file.flush()?;
    file.sync_all()
}

/// Generate a record ID: `prefix` followed by 16 random hex characters.
///
/// Uniqueness is probabilistic and not checked against existing records.
pub fn generate_id(prefix: &str) -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", prefix, hex::encode(bytes))
}
