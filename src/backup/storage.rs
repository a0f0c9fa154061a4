//! Snapshot file naming and content layout.
//!
//! Snapshots live at `configs/{sanitized_key}/{timestamp}_running-config.txt`
//! where the timestamp is `YYYY-MM-DD_HH-MM-SS`. Each file starts with a
//! four-line `!` comment header followed by the configuration verbatim.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use sha2::{Digest, Sha256};

/// Directory under the backup root that holds per-switch snapshot folders.
pub const CONFIGS_DIR: &str = "configs";

/// Suffix shared by every snapshot file name.
pub const SNAPSHOT_SUFFIX: &str = "_running-config.txt";

/// Timestamp format embedded in snapshot file names.
pub const FILE_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Timestamp format used in the snapshot header.
pub const HEADER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER_LINES: usize = 4;

/// Sanitize a switch key for use as a directory name.
/// Anything outside `[A-Za-z0-9._-]` becomes an underscore. A key made only
/// of dots (or an empty key) is turned entirely into underscores so it can't
/// name the current or parent directory.
pub fn sanitize_key(key: &str) -> String {
    let sanitized: String = key
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.chars().all(|c| c == '.') {
        return "_".repeat(sanitized.len().max(1));
    }
    sanitized
}

/// File name for a snapshot taken at `at`. `attempt > 0` adds a counter so
/// two snapshots in the same second don't collide.
pub fn snapshot_filename(at: &DateTime<Local>, attempt: u32) -> String {
    let stamp = at.format(FILE_TIME_FORMAT);
    if attempt == 0 {
        format!("{}{}", stamp, SNAPSHOT_SUFFIX)
    } else {
        format!("{}-{}{}", stamp, attempt, SNAPSHOT_SUFFIX)
    }
}

/// Whether a file name looks like a snapshot.
pub fn is_snapshot_file(name: &str) -> bool {
    name.ends_with(SNAPSHOT_SUFFIX) && name.len() > SNAPSHOT_SUFFIX.len()
}

/// The timestamp part of a snapshot file name (everything before the suffix).
pub fn timestamp_label(name: &str) -> &str {
    name.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(name)
}

/// Parse the capture time out of a snapshot file name, ignoring any
/// collision counter.
pub fn parse_snapshot_time(name: &str) -> Option<DateTime<Local>> {
    let label = timestamp_label(name);
    let stamp = label.get(..19)?;
    let naive = NaiveDateTime::parse_from_str(stamp, FILE_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Build the full snapshot content: header plus configuration bytes.
pub fn render_snapshot(at: &DateTime<Local>, name: &str, key: &str, config: &[u8]) -> Vec<u8> {
    let header = format!(
        "! Backup created: {}\n! Switch: {}\n! Address: {}\n!\n",
        at.format(HEADER_TIME_FORMAT),
        name,
        key,
    );
    let mut content = Vec::with_capacity(header.len() + config.len());
    content.extend_from_slice(header.as_bytes());
    content.extend_from_slice(config);
    content
}

/// Strip the four-line header, returning the configuration body.
///
/// Content that doesn't start with the expected header is returned whole.
pub fn strip_header(content: &[u8]) -> &[u8] {
    if !content.starts_with(b"! Backup created: ") {
        return content;
    }
    let mut rest = content;
    for _ in 0..HEADER_LINES {
        match rest.iter().position(|&b| b == b'\n') {
            Some(idx) => rest = &rest[idx + 1..],
            None => return &[],
        }
    }
    rest
}

/// Compute SHA256 hash of content (for detecting changes).
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
