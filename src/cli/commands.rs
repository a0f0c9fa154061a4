//! Command and subcommand definitions.

use clap::Subcommand;
use std::path::PathBuf;

/// Top-level commands available in switchback.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up running configurations (all switches, or one with --switch)
    Backup {
        /// Back up only the switch with this address
        #[arg(short, long, value_name = "ADDR")]
        switch: Option<String>,

        /// Push to the git remote afterwards, even if auto-sync is off
        #[arg(long)]
        sync: bool,

        /// Fall back to these login credentials (prompts for the password)
        #[arg(long, value_name = "USERNAME")]
        login: Option<String>,
    },
    /// Commit and push the backup tree to the configured remote
    Sync {
        /// Commit message (default: "Config backup - <timestamp>")
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Manage the git remote used for sync
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
    /// List snapshots for a switch, newest first
    History {
        /// Switch address
        address: String,

        /// Maximum number of snapshots to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Show file paths and sizes
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the latest snapshot for a switch
    Show {
        /// Switch address
        address: String,
    },
    /// Manage the switch inventory
    Switch {
        #[command(subcommand)]
        command: SwitchCommands,
    },
    /// Manage stored (encrypted) credentials
    Credential {
        #[command(subcommand)]
        command: CredentialCommands,
    },
    /// Manage configuration (shows current config if no subcommand provided)
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Subcommands for the sync remote.
#[derive(Subcommand, Debug)]
pub enum RemoteCommands {
    /// Initialize the backup repository and point it at a remote
    Setup {
        /// Repository URL, e.g. https://github.com/acme/switch-configs
        repo: String,

        /// Access token (prompted for if omitted)
        #[arg(long)]
        token: Option<String>,

        /// Branch to push to
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Sync automatically after every backup run
        #[arg(long)]
        auto_sync: bool,
    },
    /// Forget the remote and its token
    Reset,
    /// Show sync settings
    Status,
}

/// Subcommands for switch inventory.
#[derive(Subcommand, Debug)]
pub enum SwitchCommands {
    /// List switches
    List,
    /// Add a switch
    Add {
        /// Management address (IP or hostname)
        address: String,

        #[arg(short, long, default_value = "")]
        name: String,

        #[arg(short, long, default_value = "")]
        group: String,

        /// Stored credential or template ID
        #[arg(short, long)]
        credential: Option<String>,
    },
    /// Change a switch
    Edit {
        address: String,

        /// New address
        #[arg(long, value_name = "ADDR")]
        new_address: Option<String>,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        group: Option<String>,

        /// Stored credential or template ID
        #[arg(short, long, conflicts_with = "clear_credential")]
        credential: Option<String>,

        /// Remove the credential reference
        #[arg(long)]
        clear_credential: bool,
    },
    /// Remove a switch (its snapshots are kept)
    Remove { address: String },
    /// Copy switches from the config file into the datastore
    Import,
}

/// Subcommands for stored credentials.
#[derive(Subcommand, Debug)]
pub enum CredentialCommands {
    /// List stored credentials and config templates (passwords masked)
    List,
    /// Store a new credential
    Add {
        /// Display name
        name: String,

        #[arg(short, long)]
        username: String,

        /// Password (prompted for if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Change a stored credential
    Edit {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        username: Option<String>,

        /// Prompt for a new password
        #[arg(short, long)]
        password: bool,
    },
    /// Delete a stored credential (refused while a switch uses it)
    Remove { id: String },
    /// Copy credential templates from the config file into the datastore
    Import,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a commented default config file
    Init {
        /// Where to create the config file (default: ~/.config/switchback/switchback.kdl)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing config file
        #[arg(long)]
        overwrite: bool,
    },
    /// Show effective configuration
    Show,
    /// Check storage directories and run the encryption self-test
    Check,
}
