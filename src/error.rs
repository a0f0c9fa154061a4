//! Unified error type for switchback.
//!
//! All public APIs return `Result<T, BackupError>`. Variants follow the
//! pipeline stages (fetch, persistence, secret store, sync, credential
//! resolution) so callers can report per-switch failures precisely while
//! still being easy to construct from plain messages.

use std::fmt;

/// The unified error type for all switchback operations.
#[derive(Debug)]
pub enum BackupError {
    // ── I/O & serialization ────────────────────────────────────────────
    /// Filesystem or I/O operation failed.
    Io(std::io::Error),

    /// JSON serialization/deserialization error.
    Json(serde_json::Error),

    /// KDL config file loading or parsing error.
    Config(String),

    // ── Remote fetch ───────────────────────────────────────────────────
    /// TCP connect or SSH handshake failed.
    ConnectionFailed { address: String, message: String },

    /// The switch rejected the username/password.
    AuthenticationFailed { address: String },

    /// An interactive shell channel could not be opened.
    ShellOpenFailed { address: String, message: String },

    /// The transcript did not contain a running configuration.
    EmptyConfig { address: String },

    // ── Persistence ────────────────────────────────────────────────────
    /// A snapshot file or its directory could not be written.
    WriteFailed(String),

    /// The data directory (or key file location) is missing and cannot be
    /// created, or is not writable.
    StorageUnavailable(String),

    // ── Secret store ───────────────────────────────────────────────────
    /// Encryption failed (usually because the key is unavailable).
    Encryption(String),

    /// Decryption failed: bad encoding, truncated payload, or an
    /// authentication tag that does not verify.
    Decryption(String),

    // ── Sync ───────────────────────────────────────────────────────────
    /// The repository URL has no host component.
    InvalidRepoUrl(String),

    /// Adding the `origin` remote failed.
    RemoteConfigFailed(String),

    /// `git commit` failed for a reason other than "nothing to commit".
    CommitFailed(String),

    /// Push failed, including the pull-rebase retry.
    PushFailed(String),

    /// Sync was requested but no remote has been set up.
    SyncNotConfigured,

    /// Another process holds the sync lock for this backup root.
    SyncInProgress,

    // ── Credentials & inventory ────────────────────────────────────────
    /// No credential strategy produced a username/password for the switch.
    NoCredentials { address: String },

    /// The credential is still referenced by at least one switch.
    CredentialInUse { id: String, switches: Vec<String> },

    /// A requested switch, credential, or snapshot was not found.
    NotFound(String),

    /// User input validation failed.
    Validation(String),

    // ── Catch-all ──────────────────────────────────────────────────────
    /// Any other error.
    Other(String),
}

// ── Display ────────────────────────────────────────────────────────────

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::Io(e) => write!(f, "{}", e),
            BackupError::Json(e) => write!(f, "JSON error: {}", e),
            BackupError::Config(msg) => write!(f, "config error: {}", msg),
            BackupError::ConnectionFailed { address, message } => {
                write!(f, "connection to {} failed: {}", address, message)
            }
            BackupError::AuthenticationFailed { address } => {
                write!(f, "authentication failed for {}", address)
            }
            BackupError::ShellOpenFailed { address, message } => {
                write!(f, "failed to open shell on {}: {}", address, message)
            }
            BackupError::EmptyConfig { address } => {
                write!(f, "empty config received from {}", address)
            }
            BackupError::WriteFailed(msg) => write!(f, "write failed: {}", msg),
            BackupError::StorageUnavailable(msg) => write!(f, "storage unavailable: {}", msg),
            BackupError::Encryption(msg) => write!(f, "encryption error: {}", msg),
            BackupError::Decryption(msg) => write!(f, "decryption error: {}", msg),
            BackupError::InvalidRepoUrl(url) => write!(f, "invalid repository URL: {}", url),
            BackupError::RemoteConfigFailed(msg) => {
                write!(f, "failed to configure remote: {}", msg)
            }
            BackupError::CommitFailed(msg) => write!(f, "commit failed: {}", msg),
            BackupError::PushFailed(msg) => write!(f, "push failed: {}", msg),
            BackupError::SyncNotConfigured => write!(f, "git remote is not configured"),
            BackupError::SyncInProgress => write!(f, "another sync is already running"),
            BackupError::NoCredentials { address } => {
                write!(f, "no credentials available for {}", address)
            }
            BackupError::CredentialInUse { id, switches } => write!(
                f,
                "credential '{}' is in use by {} switch(es): {}",
                id,
                switches.len(),
                switches.join(", ")
            ),
            BackupError::NotFound(msg) => write!(f, "{}", msg),
            BackupError::Validation(msg) => write!(f, "{}", msg),
            BackupError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackupError::Io(e) => Some(e),
            BackupError::Json(e) => Some(e),
            _ => None,
        }
    }
}

// ── From implementations for common error types ────────────────────────

impl From<std::io::Error> for BackupError {
    fn from(e: std::io::Error) -> Self {
        BackupError::Io(e)
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(e: serde_json::Error) -> Self {
        BackupError::Json(e)
    }
}

impl From<String> for BackupError {
    fn from(s: String) -> Self {
        BackupError::Other(s)
    }
}

impl From<&str> for BackupError {
    fn from(s: &str) -> Self {
        BackupError::Other(s.to_string())
    }
}

// ── Convenience constructors ───────────────────────────────────────────

impl BackupError {
    /// Create a connection error for a switch address.
    pub fn connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        BackupError::ConnectionFailed {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a shell-open error for a switch address.
    pub fn shell(address: impl Into<String>, message: impl Into<String>) -> Self {
        BackupError::ShellOpenFailed {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a storage-unavailable error.
    pub fn storage(message: impl Into<String>) -> Self {
        BackupError::StorageUnavailable(message.into())
    }

    /// Create a snapshot write error.
    pub fn write_failed(message: impl Into<String>) -> Self {
        BackupError::WriteFailed(message.into())
    }

    /// Create an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        BackupError::Encryption(message.into())
    }

    /// Create a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        BackupError::Decryption(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        BackupError::NotFound(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        BackupError::Validation(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        BackupError::Config(message.into())
    }

    /// Short machine-friendly reason code, used in batch reports.
    pub fn reason(&self) -> &'static str {
        match self {
            BackupError::Io(_) => "Io",
            BackupError::Json(_) => "Json",
            BackupError::Config(_) => "Config",
            BackupError::ConnectionFailed { .. } => "ConnectionFailed",
            BackupError::AuthenticationFailed { .. } => "AuthenticationFailed",
            BackupError::ShellOpenFailed { .. } => "ShellOpenFailed",
            BackupError::EmptyConfig { .. } => "EmptyConfig",
            BackupError::WriteFailed(_) => "WriteFailed",
            BackupError::StorageUnavailable(_) => "StorageUnavailable",
            BackupError::Encryption(_) => "EncryptionError",
            BackupError::Decryption(_) => "DecryptionError",
            BackupError::InvalidRepoUrl(_) => "InvalidRepoUrl",
            BackupError::RemoteConfigFailed(_) => "RemoteConfigFailed",
            BackupError::CommitFailed(_) => "CommitFailed",
            BackupError::PushFailed(_) => "PushFailed",
            BackupError::SyncNotConfigured => "SyncNotConfigured",
            BackupError::SyncInProgress => "SyncInProgress",
            BackupError::NoCredentials { .. } => "NoCredentials",
            BackupError::CredentialInUse { .. } => "CredentialInUse",
            BackupError::NotFound(_) => "NotFound",
            BackupError::Validation(_) => "Validation",
            BackupError::Other(_) => "Other",
        }
    }
}

/// Convenience type alias for Results using BackupError.
pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_in_use_lists_switches() {
        let err = BackupError::CredentialInUse {
            id: "cred_1".to_string(),
            switches: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("cred_1"));
        assert!(msg.contains("2 switch(es)"));
        assert!(msg.contains("10.0.0.2"));
        assert_eq!(err.reason(), "CredentialInUse");
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;
        let err: BackupError = std::io::Error::other("disk gone").into();
        assert!(err.source().is_some());
        assert_eq!(err.reason(), "Io");
    }
}
