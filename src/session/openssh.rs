//! OpenSSH-backed channel
//!
//! Uses the system `ssh` client in ControlMaster mode: one long-lived master
//! process holds the authenticated connection, and every command runs as a
//! multiplexed client over its control socket. Password credentials go
//! through `sshpass -e` so the secret never appears in argv.

use crate::errors::{BridgeError, ConnectionErrorKind, Result};
use crate::session::channel::{Channel, ConnectionParams, Connector, Credential, RawOutput};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Exit status `ssh` uses for its own (transport) failures
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// `sshpass` exit status for a rejected password
const SSHPASS_BAD_PASSWORD: i32 = 5;

/// Interval between control-socket readiness checks
const READY_POLL: Duration = Duration::from_millis(50);

static SOCKET_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opens [`OpenSshChannel`]s
#[derive(Debug, Clone)]
pub struct OpenSshConnector {
    ssh_program: PathBuf,
    sshpass_program: PathBuf,
}

impl Default for OpenSshConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenSshConnector {
    pub fn new() -> Self {
        Self {
            ssh_program: PathBuf::from("ssh"),
            sshpass_program: PathBuf::from("sshpass"),
        }
    }

    /// Use a specific `ssh` binary
    pub fn with_ssh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ssh_program = program.into();
        self
    }

    fn control_socket() -> PathBuf {
        let seq = SOCKET_SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("termux-bridge-{}-{}.sock", std::process::id(), seq))
    }

    /// Command that starts the master connection
    fn master_command(&self, params: &ConnectionParams, socket: &Path) -> Command {
        let mut cmd = match &params.credential {
            Credential::Password(secret) => {
                let mut cmd = Command::new(&self.sshpass_program);
                cmd.arg("-e").arg(&self.ssh_program);
                cmd.env("SSHPASS", secret.expose());
                cmd
            }
            _ => Command::new(&self.ssh_program),
        };

        cmd.arg("-M")
            .arg("-N")
            .arg("-S")
            .arg(socket)
            .args(["-o", "ControlPersist=no"])
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .args(["-o", "ServerAliveInterval=15"])
            .args(["-o", "ServerAliveCountMax=3"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", params.connect_timeout.as_secs().max(1)));

        match &params.credential {
            Credential::Agent => {
                cmd.args(["-o", "BatchMode=yes"]);
            }
            Credential::KeyFile(path) => {
                cmd.args(["-o", "BatchMode=yes"])
                    .args(["-o", "IdentitiesOnly=yes"])
                    .arg("-i")
                    .arg(path);
            }
            Credential::Password(_) => {
                cmd.args(["-o", "PubkeyAuthentication=no"])
                    .args(["-o", "NumberOfPasswordPrompts=1"]);
            }
        }

        cmd.arg("-p")
            .arg(params.port.to_string())
            .arg(target(params))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }

    /// Whether the master answers on its control socket
    async fn master_ready(&self, params: &ConnectionParams, socket: &Path) -> bool {
        Command::new(&self.ssh_program)
            .arg("-S")
            .arg(socket)
            .args(["-O", "check"])
            .arg("-p")
            .arg(params.port.to_string())
            .arg(target(params))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Connector for OpenSshConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn Channel>> {
        let socket = Self::control_socket();
        let _ = tokio::fs::remove_file(&socket).await;

        debug!(device = %params.display_target(), socket = %socket.display(), "starting ssh master");

        let mut master = self.master_command(params, &socket).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::ConfigError(format!("ssh client not found: {}", e))
            } else {
                BridgeError::connection(
                    ConnectionErrorKind::Unreachable,
                    format!("failed to start ssh: {}", e),
                )
            }
        })?;

        loop {
            if let Some(status) = master.try_wait()? {
                let stderr = drain_stderr(&mut master).await;
                let kind = match status.code() {
                    Some(SSHPASS_BAD_PASSWORD) if is_password(params) => {
                        ConnectionErrorKind::AuthenticationRejected
                    }
                    _ => classify_stderr(&stderr).unwrap_or(ConnectionErrorKind::Unreachable),
                };
                let _ = tokio::fs::remove_file(&socket).await;
                return Err(BridgeError::connection(kind, summarize(&stderr, status.code())));
            }

            if self.master_ready(params, &socket).await {
                if let Some(stderr) = master.stderr.take() {
                    tokio::spawn(log_master_stderr(stderr));
                }
                break;
            }

            sleep(READY_POLL).await;
        }

        Ok(Box::new(OpenSshChannel {
            ssh_program: self.ssh_program.clone(),
            socket,
            port: params.port,
            target: target(params),
            master: Some(master),
        }))
    }
}

/// One established ControlMaster connection
pub struct OpenSshChannel {
    ssh_program: PathBuf,
    socket: PathBuf,
    port: u16,
    target: String,
    master: Option<Child>,
}

impl OpenSshChannel {
    fn client_command(&self) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.arg("-S")
            .arg(&self.socket)
            .arg("-p")
            .arg(self.port.to_string())
            .arg(&self.target);
        cmd
    }

    /// `ssh -O exit` for this channel's master
    fn exit_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.ssh_program);
        cmd.arg("-S")
            .arg(&self.socket)
            .args(["-O", "exit"])
            .arg("-p")
            .arg(self.port.to_string())
            .arg(&self.target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    fn master_alive(&mut self) -> bool {
        match self.master.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[async_trait]
impl Channel for OpenSshChannel {
    async fn exec(&mut self, command_line: &str) -> Result<RawOutput> {
        if !self.master_alive() {
            return Err(BridgeError::connection(
                ConnectionErrorKind::Reset,
                "ssh master connection has exited",
            ));
        }

        let output = self
            .client_command()
            .arg("--")
            .arg(command_line)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BridgeError::connection(ConnectionErrorKind::Reset, format!("ssh client failed: {}", e))
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if exit_code == SSH_TRANSPORT_FAILURE
            && (!self.master_alive() || is_mux_failure(&stderr))
        {
            return Err(BridgeError::connection(
                ConnectionErrorKind::Reset,
                summarize(&stderr, Some(exit_code)),
            ));
        }

        Ok(RawOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    async fn close(&mut self) {
        let _ = Command::from(self.exit_command()).kill_on_drop(true).status().await;

        if let Some(mut master) = self.master.take() {
            if let Err(e) = master.kill().await {
                debug!(error = %e, "ssh master already gone");
            }
        }

        if let Err(e) = tokio::fs::remove_file(&self.socket).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(socket = %self.socket.display(), error = %e, "could not remove control socket");
            }
        }
    }
}

/// Dropped without `close()`. With a password credential the tracked child
/// is `sshpass`, so killing it does not stop `ssh`; only `-O exit` over the
/// socket reaches the master.
impl Drop for OpenSshChannel {
    fn drop(&mut self) {
        if self.master.is_none() {
            return;
        }

        let exit = self.exit_command();
        let socket = self.socket.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let mut exit = Command::from(exit);
                exit.kill_on_drop(true);
                runtime.spawn(async move {
                    let _ = exit.status().await;
                    let _ = tokio::fs::remove_file(&socket).await;
                });
            }
            Err(_) => {
                let mut exit = exit;
                let _ = exit.status();
                let _ = std::fs::remove_file(&socket);
            }
        }
    }
}

/// Forward the master's diagnostics to the log until it exits
async fn log_master_stderr(pipe: ChildStderr) -> usize {
    let mut lines = BufReader::new(pipe).lines();
    let mut count = 0;
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(line = %line, "ssh master");
        count += 1;
    }
    count
}

fn target(params: &ConnectionParams) -> String {
    format!("{}@{}", params.principal, params.host)
}

fn is_password(params: &ConnectionParams) -> bool {
    matches!(params.credential, Credential::Password(_))
}

async fn drain_stderr(child: &mut Child) -> String {
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr).await;
    }
    stderr
}

/// Map an ssh diagnostic to a connection error kind
pub(crate) fn classify_stderr(stderr: &str) -> Option<ConnectionErrorKind> {
    const AUTH: &[&str] = &["Permission denied", "Too many authentication failures", "Host key verification failed"];
    const TIMEOUT: &[&str] = &["timed out", "Connection timeout"];
    const UNREACHABLE: &[&str] = &[
        "Connection refused",
        "No route to host",
        "Could not resolve hostname",
        "Network is unreachable",
        "Name or service not known",
    ];
    const RESET: &[&str] = &["Connection reset", "Broken pipe", "closed by remote host", "Connection closed"];

    let contains_any = |needles: &[&str]| needles.iter().any(|n| stderr.contains(n));

    if contains_any(AUTH) {
        Some(ConnectionErrorKind::AuthenticationRejected)
    } else if contains_any(TIMEOUT) {
        Some(ConnectionErrorKind::TimedOut)
    } else if contains_any(UNREACHABLE) {
        Some(ConnectionErrorKind::Unreachable)
    } else if contains_any(RESET) {
        Some(ConnectionErrorKind::Reset)
    } else {
        None
    }
}

/// Whether a client-side failure came from the multiplexing transport
fn is_mux_failure(stderr: &str) -> bool {
    stderr.contains("Control socket")
        || stderr.contains("mux_client")
        || matches!(classify_stderr(stderr), Some(ConnectionErrorKind::Reset))
}

fn summarize(stderr: &str, code: Option<i32>) -> String {
    let last = stderr.lines().rev().find(|line| !line.trim().is_empty());
    match (last, code) {
        (Some(line), _) => line.trim().to_string(),
        (None, Some(code)) => format!("ssh exited with status {}", code),
        (None, None) => "ssh terminated by signal".to_string(),
    }
}
