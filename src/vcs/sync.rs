//! Sync orchestration: init, remote setup, commit and push with one retry.

use std::path::{Path, PathBuf};

use chrono::Local;
use http::Uri;
use tracing::{debug, info, warn};

use super::{SyncLock, VcsClient};
use crate::error::{BackupError, Result};
use crate::settings::{SYNC_TIME_FORMAT, SettingsStore, SyncSettings};
use crate::utils::{redact_text, redact_url};

/// Remote name used for the hosted repository.
pub const REMOTE_NAME: &str = "origin";

/// Author identity for unattended commits.
pub const COMMIT_NAME: &str = "Switchback Backup";
pub const COMMIT_EMAIL: &str = "switchback@localhost";

/// Ignore rules written on init. The settings file holds the access token.
pub const GITIGNORE_CONTENT: &str = "# Ignore settings file with sensitive data\nbackup_settings.json\n.sync.lock\n";

/// What a successful sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A commit was created and pushed.
    Pushed,
    /// The working tree was clean; nothing was committed or pushed.
    NoChanges,
}

/// Build `https://<token>@<host><path>.git` from a repository URL.
///
/// The URL needs a scheme and a host; bare `host/path` strings are rejected.
pub fn authenticated_url(repo_url: &str, token: &str) -> Result<String> {
    let invalid = || BackupError::InvalidRepoUrl(redact_url(repo_url));
    let uri: Uri = repo_url.trim().parse().map_err(|_| invalid())?;
    if uri.scheme().is_none() {
        return Err(invalid());
    }
    let host = uri.host().filter(|h| !h.is_empty()).ok_or_else(invalid)?;

    let mut url = format!("https://{}@{}", token, host);
    if let Some(port) = uri.port_u16() {
        url.push_str(&format!(":{}", port));
    }
    url.push_str(uri.path().trim_end_matches('/'));
    if !url.ends_with(".git") {
        url.push_str(".git");
    }
    Ok(url)
}

/// Drives a [`VcsClient`] over the backup root.
///
/// The orchestrator does not lock; callers hold a
/// [`SyncLock`](super::SyncLock) around [`sync`](Self::sync).
pub struct SyncOrchestrator<V: VcsClient> {
    root: PathBuf,
    vcs: V,
    settings: SettingsStore,
}

impl<V: VcsClient> SyncOrchestrator<V> {
    pub fn new(root: impl Into<PathBuf>, vcs: V) -> Self {
        let root = root.into();
        let settings = SettingsStore::new(&root);
        Self {
            root,
            vcs,
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    /// Current sync settings.
    pub fn settings(&self) -> SyncSettings {
        self.settings.load()
    }

    /// Whether the backup root already is a repository.
    pub fn is_initialized(&self) -> bool {
        self.root.join(".git").is_dir()
    }

    /// Initialize the repository and its ignore rules. Idempotent.
    pub fn init_repository(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            BackupError::storage(format!(
                "failed to create backup directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        if self.is_initialized() {
            debug!(root = %self.root.display(), "repository already initialized");
        } else {
            let out = self.vcs.init();
            if !out.success() {
                return Err(BackupError::Other(format!(
                    "git init failed: {}",
                    redact_text(out.output.trim())
                )));
            }
            info!(root = %self.root.display(), "initialized backup repository");
        }
        self.ensure_gitignore()
    }

    /// Write the ignore rules if the root has no `.gitignore` yet. An
    /// existing file is left alone.
    pub fn ensure_gitignore(&self) -> Result<()> {
        let path = self.root.join(".gitignore");
        if path.exists() {
            return Ok(());
        }
        std::fs::write(&path, GITIGNORE_CONTENT).map_err(|e| {
            BackupError::storage(format!("failed to write {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "wrote ignore rules");
        Ok(())
    }

    /// Point `origin` at `repo_url`, embedding `token` for non-interactive
    /// pushes.
    pub fn configure_remote(&self, repo_url: &str, token: &str) -> Result<()> {
        let url = authenticated_url(repo_url, token)?;

        let removed = self.vcs.remove_remote(REMOTE_NAME);
        if !removed.success() {
            debug!("no existing remote to remove");
        }

        let out = self.vcs.add_remote(REMOTE_NAME, &url);
        if !out.success() {
            return Err(BackupError::RemoteConfigFailed(redact_text(out.output.trim())));
        }
        info!(remote = %redact_url(&url), "configured remote");
        Ok(())
    }

    /// Initialize, configure the remote, and persist settings.
    pub fn setup(&self, repo_url: &str, token: &str, branch: &str, auto_sync: bool) -> Result<()> {
        if repo_url.trim().is_empty() || token.trim().is_empty() {
            return Err(BackupError::validation(
                "repository URL and access token are required",
            ));
        }
        self.init_repository()?;
        self.configure_remote(repo_url, token)?;

        let mut settings = self.settings.load();
        settings.configured = true;
        settings.repo = repo_url.trim().to_string();
        settings.token = token.trim().to_string();
        settings.branch = if branch.trim().is_empty() {
            "main".to_string()
        } else {
            branch.trim().to_string()
        };
        settings.auto_sync = auto_sync;
        self.settings.save(&settings)
    }

    /// Forget the remote configuration. The local history is kept.
    pub fn reset(&self) -> Result<()> {
        let mut settings = self.settings.load();
        settings.configured = false;
        settings.repo.clear();
        settings.token.clear();
        self.settings.save(&settings)?;

        if self.is_initialized() {
            // Drop the token-bearing URL from the repository config too
            let _ = self.vcs.remove_remote(REMOTE_NAME);
        }
        info!("remote configuration reset");
        Ok(())
    }

    /// Commit everything and push.
    ///
    /// A clean tree returns [`SyncOutcome::NoChanges`] and leaves
    /// `last_sync` untouched. A rejected push gets one pull-with-rebase and
    /// a second push.
    pub fn sync(&self, message: Option<&str>) -> Result<SyncOutcome> {
        let mut settings = self.settings.load();
        if !settings.configured {
            return Err(BackupError::SyncNotConfigured);
        }

        self.ensure_gitignore()?;

        for (key, value) in [("user.email", COMMIT_EMAIL), ("user.name", COMMIT_NAME)] {
            let out = self.vcs.set_config(key, value);
            if !out.success() {
                warn!(key, output = %out.output.trim(), "failed to set git identity");
            }
        }

        let added = self.vcs.add_all();
        if !added.success() {
            warn!(output = %redact_text(added.output.trim()), "staging reported an error");
        }

        let status = self.vcs.status();
        if status.output.trim().is_empty() {
            info!("no changes to commit");
            return Ok(SyncOutcome::NoChanges);
        }

        let message = match message {
            Some(m) => m.to_string(),
            None => format!("Config backup - {}", Local::now().format(SYNC_TIME_FORMAT)),
        };
        let commit = self.vcs.commit(&message);
        if !commit.success() && !commit.output.contains("nothing to commit") {
            return Err(BackupError::CommitFailed(redact_text(commit.output.trim())));
        }

        let branch = settings.branch().to_string();
        let push = self.vcs.push(REMOTE_NAME, &branch);
        if !push.success() {
            warn!(branch = %branch, "push rejected, retrying after rebase");
            let pull = self.vcs.pull_rebase(REMOTE_NAME, &branch);
            let retry = self.vcs.push(REMOTE_NAME, &branch);
            if !retry.success() {
                let output = format!("{}\n{}\n{}", push.output, pull.output, retry.output);
                return Err(BackupError::PushFailed(redact_text(output.trim())));
            }
        }

        settings.touch_last_sync();
        if let Err(e) = self.settings.save(&settings) {
            warn!(error = %e, "pushed, but failed to record last sync time");
        }
        info!(branch = %branch, "pushed backups");
        Ok(SyncOutcome::Pushed)
    }

    /// [`sync`](Self::sync) under the root's [`SyncLock`]. Fails with
    /// `SyncInProgress` instead of waiting when another sync holds it.
    pub fn sync_exclusive(&self, message: Option<&str>) -> Result<SyncOutcome> {
        let _lock = SyncLock::try_acquire(&self.root)?;
        self.sync(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::VcsOutput;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Records calls; each verb pops a scripted result or succeeds.
    #[derive(Default)]
    struct FakeVcs {
        calls: RefCell<Vec<String>>,
        scripted: RefCell<Vec<(&'static str, VecDeque<VcsOutput>)>>,
    }

    impl FakeVcs {
        fn script(self, verb: &'static str, results: Vec<(i32, &str)>) -> Self {
            let queue = results
                .into_iter()
                .map(|(code, output)| VcsOutput {
                    code,
                    output: output.to_string(),
                })
                .collect();
            self.scripted.borrow_mut().push((verb, queue));
            self
        }

        fn record(&self, call: String, verb: &str) -> VcsOutput {
            self.calls.borrow_mut().push(call);
            let mut scripted = self.scripted.borrow_mut();
            scripted
                .iter_mut()
                .find(|(v, _)| *v == verb)
                .and_then(|(_, q)| q.pop_front())
                .unwrap_or(VcsOutput {
                    code: 0,
                    output: String::new(),
                })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl VcsClient for FakeVcs {
        fn init(&self) -> VcsOutput {
            self.record("init".into(), "init")
        }
        fn set_config(&self, key: &str, value: &str) -> VcsOutput {
            self.record(format!("config {} {}", key, value), "config")
        }
        fn add_remote(&self, name: &str, url: &str) -> VcsOutput {
            self.record(format!("remote add {} {}", name, url), "add_remote")
        }
        fn remove_remote(&self, name: &str) -> VcsOutput {
            self.record(format!("remote remove {}", name), "remove_remote")
        }
        fn add_all(&self) -> VcsOutput {
            self.record("add -A".into(), "add")
        }
        fn status(&self) -> VcsOutput {
            self.record("status".into(), "status")
        }
        fn commit(&self, message: &str) -> VcsOutput {
            self.record(format!("commit {}", message), "commit")
        }
        fn push(&self, remote: &str, branch: &str) -> VcsOutput {
            self.record(format!("push {} {}", remote, branch), "push")
        }
        fn pull_rebase(&self, remote: &str, branch: &str) -> VcsOutput {
            self.record(format!("pull --rebase {} {}", remote, branch), "pull")
        }
    }

    fn configured(dir: &TempDir, vcs: FakeVcs) -> SyncOrchestrator<FakeVcs> {
        let orch = SyncOrchestrator::new(dir.path(), vcs);
        orch.settings_store()
            .save(&SyncSettings {
                configured: true,
                repo: "https://github.com/acme/configs".into(),
                token: "tok".into(),
                branch: "backups".into(),
                ..Default::default()
            })
            .unwrap();
        orch
    }

    #[test]
    fn test_authenticated_url() {
        assert_eq!(
            authenticated_url("https://github.com/acme/configs", "ghp_x").unwrap(),
            "https://ghp_x@github.com/acme/configs.git"
        );
        assert_eq!(
            authenticated_url("https://github.com/acme/configs.git", "t").unwrap(),
            "https://t@github.com/acme/configs.git"
        );
        assert_eq!(
            authenticated_url("https://old@git.example.com:8443/team/repo/", "t").unwrap(),
            "https://t@git.example.com:8443/team/repo.git"
        );
    }

    #[test]
    fn test_url_without_host_is_invalid() {
        for bad in ["/just/a/path", "not a url", "", "github.com", "github.com/acme/configs"] {
            assert!(
                matches!(authenticated_url(bad, "t"), Err(BackupError::InvalidRepoUrl(_))),
                "{:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_init_writes_gitignore_once() {
        let dir = TempDir::new().unwrap();
        let orch = SyncOrchestrator::new(dir.path(), FakeVcs::default());
        orch.init_repository().unwrap();
        let ignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(ignore.lines().any(|l| l == crate::settings::SETTINGS_FILE));
        assert!(ignore.lines().any(|l| l == crate::vcs::SYNC_LOCK_FILE));

        // A real init would create .git; simulate it
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        orch.init_repository().unwrap();
        assert_eq!(orch.vcs().calls(), vec!["init".to_string()]);
    }

    #[test]
    fn test_existing_repository_gets_gitignore() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let orch = SyncOrchestrator::new(dir.path(), FakeVcs::default());

        orch.init_repository().unwrap();
        assert!(orch.vcs().calls().is_empty());
        let ignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(ignore, GITIGNORE_CONTENT);
    }

    #[test]
    fn test_existing_gitignore_is_kept() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "custom\n").unwrap();
        let orch = SyncOrchestrator::new(dir.path(), FakeVcs::default());
        orch.init_repository().unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".gitignore")).unwrap(),
            "custom\n"
        );
    }

    #[test]
    fn test_sync_restores_missing_gitignore() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default().script("status", vec![(0, "M configs/a\n")]);
        let orch = configured(&dir, vcs);
        assert!(!dir.path().join(".gitignore").exists());

        orch.sync(None).unwrap();
        let ignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(ignore.lines().any(|l| l == crate::settings::SETTINGS_FILE));
    }

    #[test]
    fn test_configure_remote_replaces_origin() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default().script("remove_remote", vec![(2, "No such remote")]);
        let orch = SyncOrchestrator::new(dir.path(), vcs);
        orch.configure_remote("https://github.com/acme/configs", "tok")
            .unwrap();
        assert_eq!(
            orch.vcs().calls(),
            vec![
                "remote remove origin".to_string(),
                "remote add origin https://tok@github.com/acme/configs.git".to_string(),
            ]
        );
    }

    #[test]
    fn test_configure_remote_failure_is_redacted() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default().script(
            "add_remote",
            vec![(128, "fatal: could not add https://tok@github.com/acme/configs.git")],
        );
        let orch = SyncOrchestrator::new(dir.path(), vcs);
        match orch.configure_remote("https://github.com/acme/configs", "tok") {
            Err(BackupError::RemoteConfigFailed(msg)) => assert!(!msg.contains("tok@")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sync_requires_configuration() {
        let dir = TempDir::new().unwrap();
        let orch = SyncOrchestrator::new(dir.path(), FakeVcs::default());
        assert!(matches!(orch.sync(None), Err(BackupError::SyncNotConfigured)));
        assert!(orch.vcs().calls().is_empty());
    }

    #[test]
    fn test_sync_twice_second_is_no_changes() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default().script("status", vec![(0, "?? configs/\n"), (0, "")]);
        let orch = configured(&dir, vcs);

        assert_eq!(orch.sync(Some("first")).unwrap(), SyncOutcome::Pushed);
        let after_first = orch.settings().last_sync;
        assert!(after_first.is_some());

        assert_eq!(orch.sync(None).unwrap(), SyncOutcome::NoChanges);
        assert_eq!(orch.settings().last_sync, after_first);

        let calls = orch.vcs().calls();
        assert_eq!(calls.iter().filter(|c| c.starts_with("commit")).count(), 1);
        assert_eq!(calls.iter().filter(|c| c.starts_with("push")).count(), 1);
        assert!(calls.contains(&"config user.name Switchback Backup".to_string()));
        assert!(calls.contains(&"commit first".to_string()));
        assert!(calls.contains(&"push origin backups".to_string()));
    }

    #[test]
    fn test_push_retry_after_rebase() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default()
            .script("status", vec![(0, "M configs/a\n")])
            .script("push", vec![(1, "rejected"), (0, "")]);
        let orch = configured(&dir, vcs);

        assert_eq!(orch.sync(None).unwrap(), SyncOutcome::Pushed);
        let calls = orch.vcs().calls();
        let tail: Vec<&str> = calls.iter().rev().take(3).rev().map(|s| s.as_str()).collect();
        assert_eq!(
            tail,
            vec![
                "push origin backups",
                "pull --rebase origin backups",
                "push origin backups"
            ]
        );
        assert!(calls.iter().any(|c| c.starts_with("commit Config backup - ")));
    }

    #[test]
    fn test_push_failure_after_retry() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default()
            .script("status", vec![(0, "M configs/a\n")])
            .script(
                "push",
                vec![
                    (1, "rejected"),
                    (1, "remote: denied for https://tok@github.com/x.git"),
                ],
            );
        let orch = configured(&dir, vcs);

        match orch.sync(None) {
            Err(BackupError::PushFailed(out)) => {
                assert!(out.contains("denied"));
                assert!(!out.contains("tok@"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(orch.settings().last_sync, None);
    }

    #[test]
    fn test_commit_failure() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default()
            .script("status", vec![(0, "M configs/a\n")])
            .script("commit", vec![(128, "fatal: unable to write index")]);
        let orch = configured(&dir, vcs);
        assert!(matches!(orch.sync(None), Err(BackupError::CommitFailed(_))));
        assert!(!orch.vcs().calls().iter().any(|c| c.starts_with("push")));
    }

    #[test]
    fn test_nothing_to_commit_is_not_a_failure() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default()
            .script("status", vec![(0, "M configs/a\n")])
            .script("commit", vec![(1, "nothing to commit, working tree clean")]);
        let orch = configured(&dir, vcs);
        assert_eq!(orch.sync(None).unwrap(), SyncOutcome::Pushed);
    }

    #[test]
    fn test_sync_exclusive_refuses_while_locked() {
        let dir = TempDir::new().unwrap();
        let orch = configured(&dir, FakeVcs::default().script("status", vec![(0, " M a\n")]));
        let held = SyncLock::try_acquire(dir.path()).unwrap();
        assert!(matches!(
            orch.sync_exclusive(None),
            Err(BackupError::SyncInProgress)
        ));
        assert!(orch.vcs().calls().is_empty());

        drop(held);
        assert_eq!(orch.sync_exclusive(None).unwrap(), SyncOutcome::Pushed);
    }

    #[test]
    fn test_setup_and_reset() {
        let dir = TempDir::new().unwrap();
        let orch = SyncOrchestrator::new(dir.path(), FakeVcs::default());
        orch.setup("https://github.com/acme/configs", "tok", "", true)
            .unwrap();

        let settings = orch.settings();
        assert!(settings.configured);
        assert!(settings.auto_sync);
        assert_eq!(settings.branch, "main");

        orch.reset().unwrap();
        let settings = orch.settings();
        assert!(!settings.configured);
        assert!(settings.token.is_empty());
        assert_eq!(settings.branch, "main");
    }

    #[test]
    fn test_setup_rejects_bad_url_before_saving() {
        let dir = TempDir::new().unwrap();
        let orch = SyncOrchestrator::new(dir.path(), FakeVcs::default());
        assert!(matches!(
            orch.setup("nonsense", "tok", "main", false),
            Err(BackupError::InvalidRepoUrl(_))
        ));
        assert!(!orch.settings().configured);
    }
}
