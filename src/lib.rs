//! switchback - back up network switch running configurations.
//!
//! This crate provides functionality to:
//! - Log in to switches over SSH and capture `show running-config`
//! - Keep timestamped snapshots per switch with a retention limit
//! - Store switch inventory and encrypted credentials in file-locked JSON
//! - Commit and push the backup tree to a git remote
//!
//! # Example
//!
//! ```no_run
//! use switchback::{BackupWriter, BatchRunner, ConfigFetcher, Inventory, JsonStore};
//! use switchback::fetch::FetchOptions;
//!
//! let inventory = Inventory::new(JsonStore::new("/var/lib/switchback/data"));
//! let runner: BatchRunner = BatchRunner::new(
//!     inventory,
//!     ConfigFetcher::ssh(FetchOptions::default()),
//!     BackupWriter::new("/var/lib/switchback/backups", 30),
//! );
//!
//! let report = runner.run_all();
//! println!("{} succeeded, {} failed", report.succeeded(), report.failed());
//! ```

pub mod backup;
pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod db;
pub mod error;
pub mod fetch;
pub mod settings;
pub mod utils;
pub mod vcs;

// Re-export commonly used types at the crate root
pub use backup::BackupWriter;
pub use batch::{BatchReport, BatchRunner, ProgressEvent, SwitchResult};
pub use config::Config;
pub use credentials::{CredentialChain, CredentialStrategy, CredentialTemplate, LoginCredentials};
pub use crypto::SecretStore;
pub use db::{Inventory, JsonStore};
pub use error::{BackupError, Result};
pub use fetch::ConfigFetcher;
pub use vcs::{GitCli, SyncOrchestrator, SyncOutcome};
