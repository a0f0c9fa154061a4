//! End-to-end batch runs against scripted switches.
//!
//! The shell transport and git client are fakes; everything else (datastore,
//! encryption, snapshot files, retention) runs for real in a temp directory.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchback::backup::BackupWriter;
use switchback::batch::{BatchRunner, ProgressEvent};
use switchback::credentials::{
    CredentialChain, CredentialStrategy, CredentialTemplate, LoginCredentials,
};
use switchback::db::{Inventory, JsonStore, Switch};
use switchback::fetch::{ConfigFetcher, FetchOptions, ShellChannel, ShellSession, ShellTransport};
use switchback::settings::SyncSettings;
use switchback::vcs::{GitCli, SyncOrchestrator, SyncOutcome, VcsClient, VcsOutput};
use switchback::{BackupError, Result};
use tempfile::TempDir;

type LoginLog = Arc<Mutex<Vec<(String, String, String)>>>;

/// Devices keyed by address: expected (username, password) and hostname.
#[derive(Clone, Default)]
struct FakeNetwork {
    devices: HashMap<String, (String, String, String)>,
    logins: LoginLog,
}

impl FakeNetwork {
    fn device(mut self, address: &str, username: &str, password: &str, hostname: &str) -> Self {
        self.devices.insert(
            address.to_string(),
            (username.into(), password.into(), hostname.into()),
        );
        self
    }

    fn logins(&self) -> Vec<(String, String, String)> {
        self.logins.lock().unwrap().clone()
    }
}

struct FakeSession {
    address: String,
    expected: (String, String, String),
    logins: LoginLog,
}

struct FakeChannel {
    output: Vec<u8>,
    sent: bool,
    done: bool,
}

impl ShellTransport for FakeNetwork {
    fn connect(&self, address: &str, _port: u16) -> io::Result<Box<dyn ShellSession>> {
        let expected = self
            .devices
            .get(address)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "no route to host"))?;
        Ok(Box::new(FakeSession {
            address: address.to_string(),
            expected,
            logins: Arc::clone(&self.logins),
        }))
    }
}

impl ShellSession for FakeSession {
    fn authenticate(&mut self, username: &str, password: &str) -> io::Result<()> {
        self.logins.lock().unwrap().push((
            self.address.clone(),
            username.to_string(),
            password.to_string(),
        ));
        if username == self.expected.0 && password == self.expected.1 {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "bad password"))
        }
    }

    fn open_shell(&mut self) -> io::Result<Box<dyn ShellChannel>> {
        let host = &self.expected.2;
        let transcript = format!(
            "Welcome to {host}\r\n{host}#terminal length 0\r\n{host}#show running-config\r\n\
             Building configuration...\r\n\r\nCurrent configuration : 120 bytes\r\n!\r\n\
             hostname {host}\r\n!\r\nend\r\n\r\n{host}#"
        );
        Ok(Box::new(FakeChannel {
            output: transcript.into_bytes(),
            sent: false,
            done: false,
        }))
    }
}

impl ShellChannel for FakeChannel {
    fn send(&mut self, _data: &[u8]) -> io::Result<()> {
        self.sent = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.sent || self.done {
            return Ok(0);
        }
        let n = self.output.len().min(buf.len());
        buf[..n].copy_from_slice(&self.output[..n]);
        self.output.drain(..n);
        self.done = self.output.is_empty();
        Ok(n)
    }

    fn is_eof(&self) -> bool {
        self.done
    }

    fn close(&mut self) {}
}

/// Git client that records calls and reports a dirty tree. With
/// `reject_push` every push is refused.
#[derive(Default)]
struct RecordingVcs {
    calls: RefCell<Vec<String>>,
    reject_push: bool,
}

impl RecordingVcs {
    fn ok(&self, call: String) -> VcsOutput {
        self.calls.borrow_mut().push(call);
        VcsOutput {
            code: 0,
            output: String::new(),
        }
    }
}

impl VcsClient for RecordingVcs {
    fn init(&self) -> VcsOutput {
        self.ok("init".into())
    }
    fn set_config(&self, key: &str, value: &str) -> VcsOutput {
        self.ok(format!("config {} {}", key, value))
    }
    fn add_remote(&self, name: &str, url: &str) -> VcsOutput {
        self.ok(format!("remote add {} {}", name, url))
    }
    fn remove_remote(&self, name: &str) -> VcsOutput {
        self.ok(format!("remote remove {}", name))
    }
    fn add_all(&self) -> VcsOutput {
        self.ok("add -A".into())
    }
    fn status(&self) -> VcsOutput {
        self.calls.borrow_mut().push("status".into());
        VcsOutput {
            code: 0,
            output: "?? configs/\n".into(),
        }
    }
    fn commit(&self, message: &str) -> VcsOutput {
        self.ok(format!("commit {}", message))
    }
    fn push(&self, remote: &str, branch: &str) -> VcsOutput {
        let out = self.ok(format!("push {} {}", remote, branch));
        if self.reject_push {
            return VcsOutput {
                code: 1,
                output: "! [rejected] HEAD -> main (fetch first)".into(),
            };
        }
        out
    }
    fn pull_rebase(&self, remote: &str, branch: &str) -> VcsOutput {
        self.ok(format!("pull --rebase {} {}", remote, branch))
    }
}

struct Fixture {
    dir: TempDir,
    inventory: Inventory,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let inventory = Inventory::new(JsonStore::new(dir.path().join("data")));
        Self { dir, inventory }
    }

    fn writer(&self) -> BackupWriter {
        BackupWriter::new(self.dir.path().join("backups"), 30)
    }

    fn add_switch(&self, address: &str, name: &str, credential: Option<&str>) {
        let mut switch = Switch::new(address, name);
        switch.credential = credential.map(str::to_string);
        self.inventory.create_switch(switch).unwrap();
    }

    fn runner<V: VcsClient>(self, network: &FakeNetwork) -> (TempDir, BatchRunner<V>) {
        let options = FetchOptions {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
            ..FetchOptions::default()
        };
        let fetcher = ConfigFetcher::new(Box::new(network.clone()), options);
        let writer = self.writer();
        (self.dir, BatchRunner::new(self.inventory, fetcher, writer))
    }
}

fn template(id: &str, username: &str, password: &str) -> CredentialTemplate {
    CredentialTemplate {
        id: id.into(),
        name: id.into(),
        username: username.into(),
        password: password.into(),
    }
}

#[test]
fn test_template_and_stored_credentials_back_up_both_switches() {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.1", "A", Some("tpl1"));
    fixture.add_switch("10.0.0.2", "B", None);
    fixture
        .inventory
        .create_credential("cred1", "bob", "bob-secret")
        .unwrap();

    let network = FakeNetwork::default()
        .device("10.0.0.1", "alice", "alice-secret", "sw-a")
        .device("10.0.0.2", "bob", "bob-secret", "sw-b");
    let (dir, runner) = fixture.runner::<GitCli>(&network);
    let runner = runner.with_templates(vec![template("tpl1", "alice", "alice-secret")]);

    let report = runner.run_all();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 0);
    assert!(report.all_succeeded());
    assert!(report.sync.is_none());

    assert_eq!(
        network.logins(),
        vec![
            ("10.0.0.1".into(), "alice".into(), "alice-secret".into()),
            ("10.0.0.2".into(), "bob".into(), "bob-secret".into()),
        ]
    );

    for (address, host) in [("10.0.0.1", "sw-a"), ("10.0.0.2", "sw-b")] {
        let snapshots = runner.writer().list_backups(address).unwrap();
        assert_eq!(snapshots.len(), 1, "{}", address);
        let path = &snapshots[0].path;
        assert!(path.starts_with(dir.path().join("backups/configs").join(address)));
        assert_eq!(report.result_for(address).unwrap().path(), Some(path));

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("! Backup created: "));
        assert!(content.contains(&format!("! Address: {}\n", address)));
        let body = String::from_utf8(runner.writer().read_snapshot(path).unwrap()).unwrap();
        assert!(body.starts_with("Building configuration..."));
        assert!(body.contains(&format!("hostname {}", host)));
        assert!(body.trim_end().ends_with("end"));
    }
}

#[test]
fn test_switch_without_any_credential_fails_with_no_credentials() {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.3", "C", None);

    let network = FakeNetwork::default().device("10.0.0.3", "x", "y", "sw-c");
    let (_dir, runner) = fixture.runner::<GitCli>(&network);

    let report = runner.run_all();

    assert_eq!(report.failed(), 1);
    assert!(!report.all_succeeded());
    let result = report.result_for("10.0.0.3").unwrap();
    assert_eq!(result.reason(), Some("NoCredentials"));
    assert!(network.logins().is_empty());
    assert!(runner.writer().list_backups("10.0.0.3").unwrap().is_empty());
}

#[test]
fn test_missing_credentials_do_not_stop_other_switches() {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.3", "C", None);
    fixture.add_switch("10.0.0.1", "A", Some("tpl1"));

    let network = FakeNetwork::default()
        .device("10.0.0.1", "alice", "pw", "sw-a")
        .device("10.0.0.3", "x", "y", "sw-c");
    let (_dir, runner) = fixture.runner::<GitCli>(&network);
    let runner = runner
        .with_templates(vec![template("tpl1", "alice", "pw")])
        .with_chain(CredentialChain::new(vec![
            CredentialStrategy::Referenced,
            CredentialStrategy::FirstStored,
            CredentialStrategy::MatchingTemplate,
        ]));

    let report = runner.run_all();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.result_for("10.0.0.3").unwrap().reason(),
        Some("NoCredentials")
    );
    assert!(report.result_for("10.0.0.1").unwrap().is_success());
}

#[test]
fn test_failures_are_isolated_and_progress_errors_ignored() {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.9", "unreachable", None);
    fixture.add_switch("10.0.0.1", "A", None);
    fixture.add_switch("10.0.0.2", "wrong-password", None);

    let network = FakeNetwork::default()
        .device("10.0.0.1", "op", "pw", "sw-a")
        .device("10.0.0.2", "op", "other", "sw-b");
    let (_dir, runner) = fixture.runner::<GitCli>(&network);
    let runner = runner.with_session(Some(LoginCredentials::session("op", "pw")));

    let mut events = Vec::new();
    let report = runner.run_all_with(|event: &ProgressEvent<'_>| {
        let label = match event {
            ProgressEvent::Starting { index, total, .. } => format!("start {}/{}", index, total),
            ProgressEvent::Succeeded { .. } => "ok".to_string(),
            ProgressEvent::Failed { error, .. } => format!("fail {}", error.reason()),
        };
        events.push(format!("{} {}", event.address(), label));
        Err(BackupError::Other("display went away".into()))
    });

    assert_eq!(
        events,
        vec![
            "10.0.0.9 start 0/3",
            "10.0.0.9 fail ConnectionFailed",
            "10.0.0.1 start 1/3",
            "10.0.0.1 ok",
            "10.0.0.2 start 2/3",
            "10.0.0.2 fail AuthenticationFailed",
        ]
    );
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 2);
}

#[test]
fn test_run_one_unknown_address_is_not_found() {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.1", "A", None);
    let (_dir, runner) = fixture.runner::<GitCli>(&FakeNetwork::default());

    assert!(matches!(
        runner.run_one("10.9.9.9"),
        Err(BackupError::NotFound(_))
    ));
}

#[test]
fn test_run_one_backs_up_only_that_switch() {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.1", "A", None);
    fixture.add_switch("10.0.0.2", "B", None);
    fixture.inventory.create_credential("cred1", "op", "pw").unwrap();

    let network = FakeNetwork::default()
        .device("10.0.0.1", "op", "pw", "sw-a")
        .device("10.0.0.2", "op", "pw", "sw-b");
    let (_dir, runner) = fixture.runner::<GitCli>(&network);

    let report = runner.run_one("10.0.0.2").unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(report.all_succeeded());
    assert!(runner.writer().list_backups("10.0.0.1").unwrap().is_empty());
    assert_eq!(runner.writer().list_backups("10.0.0.2").unwrap().len(), 1);
}

#[test]
fn test_auto_sync_runs_once_after_batch() -> Result<()> {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.1", "A", None);
    fixture.add_switch("10.0.0.2", "B", None);
    fixture.inventory.create_credential("cred1", "op", "pw")?;

    let backups = fixture.dir.path().join("backups");
    let orchestrator = SyncOrchestrator::new(&backups, RecordingVcs::default());
    orchestrator.settings_store().save(&SyncSettings {
        configured: true,
        repo: "https://github.com/acme/configs".into(),
        token: "tok".into(),
        auto_sync: true,
        ..Default::default()
    })?;

    let network = FakeNetwork::default()
        .device("10.0.0.1", "op", "pw", "sw-a")
        .device("10.0.0.2", "op", "pw", "sw-b");
    let (_dir, runner) = fixture.runner::<RecordingVcs>(&network);
    let runner = runner.with_sync(orchestrator);

    let report = runner.run_all();

    assert!(report.all_succeeded());
    assert!(matches!(report.sync, Some(Ok(SyncOutcome::Pushed))));
    Ok(())
}

#[test]
fn test_sync_skipped_without_auto_sync_or_request() -> Result<()> {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.1", "A", None);
    fixture.inventory.create_credential("cred1", "op", "pw")?;

    let backups = fixture.dir.path().join("backups");
    let orchestrator = SyncOrchestrator::new(&backups, RecordingVcs::default());
    orchestrator.settings_store().save(&SyncSettings {
        configured: true,
        repo: "https://github.com/acme/configs".into(),
        token: "tok".into(),
        ..Default::default()
    })?;

    let network = FakeNetwork::default().device("10.0.0.1", "op", "pw", "sw-a");
    let (_dir, runner) = fixture.runner::<RecordingVcs>(&network);
    let runner = runner.with_sync(orchestrator);
    assert!(runner.run_all().sync.is_none());

    let runner = runner.sync_requested(true);
    let report = runner.run_one("10.0.0.1")?;
    assert!(matches!(report.sync, Some(Ok(SyncOutcome::Pushed))));
    Ok(())
}

#[test]
fn test_push_failure_keeps_snapshots() -> Result<()> {
    let fixture = Fixture::new();
    fixture.add_switch("10.0.0.1", "A", None);
    fixture.add_switch("10.0.0.2", "B", None);
    fixture.inventory.create_credential("cred1", "op", "pw")?;

    let backups = fixture.dir.path().join("backups");
    let vcs = RecordingVcs {
        reject_push: true,
        ..Default::default()
    };
    let orchestrator = SyncOrchestrator::new(&backups, vcs);
    orchestrator.settings_store().save(&SyncSettings {
        configured: true,
        repo: "https://github.com/acme/configs".into(),
        token: "tok".into(),
        auto_sync: true,
        ..Default::default()
    })?;

    let network = FakeNetwork::default()
        .device("10.0.0.1", "op", "pw", "sw-a")
        .device("10.0.0.2", "op", "pw", "sw-b");
    let (_dir, runner) = fixture.runner::<RecordingVcs>(&network);
    let runner = runner.with_sync(orchestrator);

    let report = runner.run_all();

    assert!(matches!(report.sync, Some(Err(BackupError::PushFailed(_)))));
    assert!(report.all_succeeded());
    for address in ["10.0.0.1", "10.0.0.2"] {
        let snapshots = runner.writer().list_backups(address)?;
        assert_eq!(snapshots.len(), 1, "{}", address);
        assert!(snapshots[0].path.exists());
        assert_eq!(report.result_for(address).unwrap().path(), Some(&snapshots[0].path));
    }
    Ok(())
}
