//! Remote channel abstraction
//!
//! The authenticated transport is an external primitive. The bridge only
//! needs to open it, run one command line at a time over it, and tear it
//! down; [`Connector`] and [`Channel`] are that seam.

use crate::errors::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A secret that never appears in `Debug` or log output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret for handing to the transport
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// How the principal authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Whatever the local SSH agent offers
    Agent,

    Password(Secret),

    KeyFile(PathBuf),
}

/// Connection parameters, supplied once at startup
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub principal: String,
    pub credential: Credential,

    /// Deadline for establishing the channel
    pub connect_timeout: Duration,

    /// Command run once after each successful connect (e.g. `termux-api-start`)
    pub on_connect: Option<String>,
}

impl ConnectionParams {
    /// `user@host:port` for log lines
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}", self.principal, self.host, self.port)
    }
}

/// Raw output of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// An established, authenticated channel
///
/// `exec` must only fail with `BridgeError::Connection`; a remote command
/// that runs and exits non-zero is an `Ok` with its exit code.
#[async_trait]
pub trait Channel: Send {
    /// Run one command line and wait for its output streams to close
    async fn exec(&mut self, command_line: &str) -> Result<RawOutput>;

    /// Ask the remote side to stop the command in flight.
    /// Returns false when the transport has no such signal.
    async fn cancel(&mut self) -> bool {
        false
    }

    /// Tear the channel down
    async fn close(&mut self);
}

/// Opens channels
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Channel>>;
}
