//! Shell transport abstraction and the libssh2 implementation.
//!
//! The fetcher only needs three things from a transport: connect, password
//! authentication, and an interactive PTY shell it can write commands to and
//! poll for output. Keeping that behind traits lets tests script a device.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

/// Opens sessions to devices.
pub trait ShellTransport: Send + Sync {
    /// Open a network connection and complete the protocol handshake.
    fn connect(&self, address: &str, port: u16) -> io::Result<Box<dyn ShellSession>>;
}

/// A connected, not yet authenticated session.
pub trait ShellSession {
    /// Password authentication. An `Err` means the device rejected the login
    /// (or the exchange failed before it could answer).
    fn authenticate(&mut self, username: &str, password: &str) -> io::Result<()>;

    /// Request an interactive terminal shell (not exec mode).
    fn open_shell(&mut self) -> io::Result<Box<dyn ShellChannel>>;
}

/// An open interactive shell.
pub trait ShellChannel {
    /// Write bytes to the remote shell's stdin.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read whatever output is available without blocking for long.
    ///
    /// `Ok(0)` or `ErrorKind::WouldBlock` mean nothing is available yet.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Whether the remote side has closed its output.
    fn is_eof(&self) -> bool;

    /// Close the channel, ignoring errors.
    fn close(&mut self);
}

/// PTY size requested for the shell; wide and tall so the device never wraps
/// or pages.
const PTY_COLUMNS: u32 = 200;
const PTY_ROWS: u32 = 10_000;

/// libssh2-backed transport.
#[derive(Debug, Clone)]
pub struct Ssh2Transport {
    connect_timeout: Duration,
}

impl Ssh2Transport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for Ssh2Transport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl ShellTransport for Ssh2Transport {
    fn connect(&self, address: &str, port: u16) -> io::Result<Box<dyn ShellSession>> {
        let mut last_err = None;
        let mut stream = None;
        for addr in (address, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    debug!(%addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                return Err(last_err.unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, "address did not resolve")
                }));
            }
        };

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(stream);
        session.set_timeout(self.connect_timeout.as_millis().min(u32::MAX as u128) as u32);
        session.handshake()?;
        Ok(Box::new(Ssh2Session { session }))
    }
}

struct Ssh2Session {
    session: ssh2::Session,
}

impl ShellSession for Ssh2Session {
    fn authenticate(&mut self, username: &str, password: &str) -> io::Result<()> {
        self.session.userauth_password(username, password)?;
        if !self.session.authenticated() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "password rejected",
            ));
        }
        Ok(())
    }

    fn open_shell(&mut self) -> io::Result<Box<dyn ShellChannel>> {
        let mut channel = self.session.channel_session()?;
        channel.request_pty("vanilla", None, Some((PTY_COLUMNS, PTY_ROWS, 0, 0)))?;
        channel.shell()?;
        Ok(Box::new(Ssh2Channel {
            session: self.session.clone(),
            channel,
            nonblocking: false,
        }))
    }
}

struct Ssh2Channel {
    session: ssh2::Session,
    channel: ssh2::Channel,
    nonblocking: bool,
}

impl ShellChannel for Ssh2Channel {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.channel.write_all(data)?;
        self.channel.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Writes are done blocking; reads poll so the caller owns the deadline
        if !self.nonblocking {
            self.session.set_blocking(false);
            self.nonblocking = true;
        }
        self.channel.read(buf)
    }

    fn is_eof(&self) -> bool {
        self.channel.eof()
    }

    fn close(&mut self) {
        self.session.set_blocking(true);
        let _ = self.channel.close();
    }
}
