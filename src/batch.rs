//! Batch runner: resolve credentials, fetch, and save for each switch.
//!
//! Switches are processed strictly one after another. A failure on one switch
//! is recorded in the report and never stops the batch. After the loop the
//! backup tree is synced once, if a remote is configured and either auto-sync
//! is on or the caller asked for it.

use std::path::PathBuf;

use chrono::Local;
use tracing::{info, warn};

use crate::backup::{BackupWriter, SavedSnapshot};
use crate::credentials::{CredentialChain, CredentialTemplate, LoginCredentials, ResolveContext};
use crate::db::{Credential, Inventory, Switch};
use crate::error::{BackupError, Result};
use crate::fetch::ConfigFetcher;
use crate::settings::SYNC_TIME_FORMAT;
use crate::vcs::{GitCli, SyncOrchestrator, SyncOutcome, VcsClient};

/// Progress notification emitted at each per-switch transition.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    Starting {
        index: usize,
        total: usize,
        switch: &'a Switch,
    },
    Succeeded {
        index: usize,
        total: usize,
        switch: &'a Switch,
        saved: &'a SavedSnapshot,
    },
    Failed {
        index: usize,
        total: usize,
        switch: &'a Switch,
        error: &'a BackupError,
    },
}

impl ProgressEvent<'_> {
    pub fn address(&self) -> &str {
        match self {
            ProgressEvent::Starting { switch, .. }
            | ProgressEvent::Succeeded { switch, .. }
            | ProgressEvent::Failed { switch, .. } => &switch.address,
        }
    }
}

/// Outcome for one switch.
#[derive(Debug)]
pub struct SwitchResult {
    pub address: String,
    pub name: String,
    pub outcome: Result<SavedSnapshot>,
}

impl SwitchResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Path of the written snapshot, on success.
    pub fn path(&self) -> Option<&PathBuf> {
        self.outcome.as_ref().ok().map(|s| &s.path)
    }

    /// Failure reason code, on failure.
    pub fn reason(&self) -> Option<&'static str> {
        self.outcome.as_ref().err().map(BackupError::reason)
    }
}

/// Everything a batch did.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<SwitchResult>,
    /// `None` when no sync was attempted.
    pub sync: Option<Result<SyncOutcome>>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Exit signal: every switch was backed up. Sync results are reported
    /// separately and do not affect this.
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn result_for(&self, address: &str) -> Option<&SwitchResult> {
        self.results.iter().find(|r| r.address == address)
    }
}

/// Drives the fetch/save pipeline over the inventory.
pub struct BatchRunner<V: VcsClient = GitCli> {
    inventory: Inventory,
    fetcher: ConfigFetcher,
    writer: BackupWriter,
    templates: Vec<CredentialTemplate>,
    chain: CredentialChain,
    session: Option<LoginCredentials>,
    sync: Option<SyncOrchestrator<V>>,
    sync_requested: bool,
}

impl<V: VcsClient> BatchRunner<V> {
    pub fn new(inventory: Inventory, fetcher: ConfigFetcher, writer: BackupWriter) -> Self {
        Self {
            inventory,
            fetcher,
            writer,
            templates: Vec::new(),
            chain: CredentialChain::default(),
            session: None,
            sync: None,
            sync_requested: false,
        }
    }

    /// Statically configured credential templates.
    pub fn with_templates(mut self, templates: Vec<CredentialTemplate>) -> Self {
        self.templates = templates;
        self
    }

    /// Replace the default credential precedence.
    pub fn with_chain(mut self, chain: CredentialChain) -> Self {
        self.chain = chain;
        self
    }

    /// Operator credentials used when nothing else matches.
    pub fn with_session(mut self, session: Option<LoginCredentials>) -> Self {
        self.session = session;
        self
    }

    pub fn with_sync(mut self, orchestrator: SyncOrchestrator<V>) -> Self {
        self.sync = Some(orchestrator);
        self
    }

    /// Sync after the batch even when auto-sync is off.
    pub fn sync_requested(mut self, requested: bool) -> Self {
        self.sync_requested = requested;
        self
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn writer(&self) -> &BackupWriter {
        &self.writer
    }

    /// Back up every switch in inventory order.
    pub fn run_all(&self) -> BatchReport {
        self.run_all_with(|_| Ok(()))
    }

    /// [`run_all`](Self::run_all) with a progress callback. Callback errors
    /// are logged and otherwise ignored.
    pub fn run_all_with<F>(&self, progress: F) -> BatchReport
    where
        F: FnMut(&ProgressEvent<'_>) -> Result<()>,
    {
        let switches = self.inventory.list_switches();
        info!(count = switches.len(), "starting backup batch");
        let results = self.run_switches(&switches, progress);
        let message = format!("Scheduled backup - {}", Local::now().format(SYNC_TIME_FORMAT));
        let sync = self.maybe_sync(&message);
        BatchReport { results, sync }
    }

    /// Back up a single switch by address.
    pub fn run_one(&self, address: &str) -> Result<BatchReport> {
        self.run_one_with(address, |_| Ok(()))
    }

    pub fn run_one_with<F>(&self, address: &str, progress: F) -> Result<BatchReport>
    where
        F: FnMut(&ProgressEvent<'_>) -> Result<()>,
    {
        let switch = self
            .inventory
            .get_switch(address)
            .ok_or_else(|| BackupError::not_found(format!("switch not found: {}", address)))?;
        let message = format!("Backup {}", switch.display_name());
        let results = self.run_switches(std::slice::from_ref(&switch), progress);
        let sync = self.maybe_sync(&message);
        Ok(BatchReport { results, sync })
    }

    fn run_switches<F>(&self, switches: &[Switch], mut progress: F) -> Vec<SwitchResult>
    where
        F: FnMut(&ProgressEvent<'_>) -> Result<()>,
    {
        let stored = self.inventory.list_credentials();
        let total = switches.len();
        let mut results = Vec::with_capacity(total);

        for (index, switch) in switches.iter().enumerate() {
            notify(&mut progress, &ProgressEvent::Starting { index, total, switch });

            let outcome = self.backup_switch(switch, &stored);
            match &outcome {
                Ok(saved) => {
                    info!(switch = %switch.address, path = %saved.path.display(), "backup succeeded");
                    notify(
                        &mut progress,
                        &ProgressEvent::Succeeded {
                            index,
                            total,
                            switch,
                            saved,
                        },
                    );
                }
                Err(error) => {
                    warn!(switch = %switch.address, reason = error.reason(), error = %error, "backup failed");
                    notify(
                        &mut progress,
                        &ProgressEvent::Failed {
                            index,
                            total,
                            switch,
                            error,
                        },
                    );
                }
            }

            results.push(SwitchResult {
                address: switch.address.clone(),
                name: switch.display_name().to_string(),
                outcome,
            });
        }
        results
    }

    fn backup_switch(&self, switch: &Switch, stored: &[Credential]) -> Result<SavedSnapshot> {
        let ctx = ResolveContext {
            stored,
            templates: &self.templates,
            session: self.session.as_ref(),
        };
        let login = self.chain.resolve(switch, &ctx)?;
        let config = self
            .fetcher
            .fetch(&switch.address, &login.username, &login.password)?;
        self.writer
            .save(&switch.address, switch.display_name(), &config)
    }

    fn maybe_sync(&self, message: &str) -> Option<Result<SyncOutcome>> {
        let orchestrator = self.sync.as_ref()?;
        let settings = orchestrator.settings();
        if !(settings.auto_sync || self.sync_requested) {
            return None;
        }
        if !settings.configured {
            if self.sync_requested {
                warn!("sync requested but no remote is configured");
            }
            return None;
        }
        let result = orchestrator.sync_exclusive(Some(message));
        if let Err(e) = &result {
            warn!(error = %e, "sync after backup failed");
        }
        Some(result)
    }
}

fn notify<F>(progress: &mut F, event: &ProgressEvent<'_>)
where
    F: FnMut(&ProgressEvent<'_>) -> Result<()>,
{
    if let Err(e) = progress(event) {
        warn!(address = event.address(), error = %e, "progress callback failed");
    }
}
