//! Remote config fetcher.
//!
//! One invocation walks a fixed state machine: connect, authenticate, open an
//! interactive shell, send `terminal length 0` / `show running-config` /
//! `exit`, then poll the channel until the transcript is complete, the remote
//! closes, or the deadline passes. Whatever arrived is run through
//! [`clean_running_config`]; an empty result is an error.

mod transcript;
mod transport;

use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{BackupError, Result};

pub use transcript::{clean_running_config, is_transcript_complete};
pub use transport::{ShellChannel, ShellSession, ShellTransport, Ssh2Transport};

/// Commands sent to the device, in order.
pub const SHELL_COMMANDS: &str = "terminal length 0\nshow running-config\nexit\n";

const READ_CHUNK: usize = 8192;

/// Tunables for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub port: u16,
    /// Wall-clock limit for reading the transcript.
    pub timeout: Duration,
    /// Sleep between reads that return no data.
    pub poll_interval: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            port: 22,
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Retrieves running configurations over a [`ShellTransport`].
pub struct ConfigFetcher {
    transport: Box<dyn ShellTransport>,
    options: FetchOptions,
}

impl ConfigFetcher {
    pub fn new(transport: Box<dyn ShellTransport>, options: FetchOptions) -> Self {
        Self { transport, options }
    }

    /// Fetcher using libssh2.
    pub fn ssh(options: FetchOptions) -> Self {
        Self::new(Box::new(Ssh2Transport::default()), options)
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Log in to `address` and return its running configuration.
    pub fn fetch(&self, address: &str, username: &str, password: &str) -> Result<Vec<u8>> {
        debug!(%address, port = self.options.port, "connecting");
        let mut session = self
            .transport
            .connect(address, self.options.port)
            .map_err(|e| BackupError::connection(address, e.to_string()))?;

        session.authenticate(username, password).map_err(|e| {
            debug!(%address, error = %e, "authentication rejected");
            BackupError::AuthenticationFailed {
                address: address.to_string(),
            }
        })?;

        let mut channel = session
            .open_shell()
            .map_err(|e| BackupError::shell(address, e.to_string()))?;

        let sent = channel.send(SHELL_COMMANDS.as_bytes());
        let raw = match sent {
            Ok(()) => self.read_transcript(address, channel.as_mut()),
            Err(e) => {
                channel.close();
                return Err(BackupError::shell(address, format!("write failed: {}", e)));
            }
        };
        channel.close();

        let config = clean_running_config(&raw);
        if config.trim_ascii().is_empty() {
            return Err(BackupError::EmptyConfig {
                address: address.to_string(),
            });
        }
        info!(%address, bytes = config.len(), "retrieved running config");
        Ok(config)
    }

    fn read_transcript(&self, address: &str, channel: &mut dyn ShellChannel) -> Vec<u8> {
        let started = Instant::now();
        let mut raw = Vec::new();
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if started.elapsed() >= self.options.timeout {
                warn!(%address, timeout = ?self.options.timeout, "timed out waiting for config, using partial output");
                break;
            }

            match channel.read(&mut buf) {
                Ok(0) => {
                    if channel.is_eof() {
                        break;
                    }
                    thread::sleep(self.options.poll_interval);
                }
                Ok(n) => {
                    raw.extend_from_slice(&buf[..n]);
                    if is_transcript_complete(&String::from_utf8_lossy(&raw)) {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                    if channel.is_eof() {
                        break;
                    }
                    thread::sleep(self.options.poll_interval);
                }
                Err(e) => {
                    warn!(%address, error = %e, "read failed, using output so far");
                    break;
                }
            }
        }

        raw
    }
}
