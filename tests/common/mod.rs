//! Scripted in-memory device shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use termux_bridge::errors::{BridgeError, ConnectionErrorKind, Result};
use termux_bridge::execution::ExecutionEngine;
use termux_bridge::session::{
    Channel, ConnectionParams, Connector, Credential, RawOutput, ReconnectPolicy, SessionManager,
};
use termux_bridge::tools::{CapabilityRegistry, ToolRuntime};

/// What the device does for a command
#[derive(Debug, Clone)]
pub enum Reply {
    Output {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// Never finishes
    Hang,
    /// Transport breaks mid-command
    Reset,
}

impl Reply {
    pub fn stdout(stdout: &str) -> Self {
        Reply::Output {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn exit(exit_code: i32, stderr: &str) -> Self {
        Reply::Output {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// A fake phone: replies are matched on the command's first word
#[derive(Default)]
pub struct ScriptedDevice {
    replies: Mutex<Vec<(String, Reply)>>,
    one_shot: Mutex<Vec<(String, Reply)>>,
    pub commands: Mutex<Vec<String>>,
    pub connects: AtomicU32,
    connect_failures: AtomicU32,
    pub exec_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply to every run of `program`
    pub fn on(&self, program: &str, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push((program.to_string(), reply));
        self
    }

    /// Reply to the next run of `program` only
    pub fn once(&self, program: &str, reply: Reply) -> &Self {
        self.one_shot.lock().unwrap().push((program.to_string(), reply));
        self
    }

    /// Refuse the next `n` connection attempts as unreachable
    pub fn fail_connects(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_exec_delay(&self, delay: Duration) {
        *self.exec_delay.lock().unwrap() = delay;
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    fn reply_for(&self, command_line: &str) -> Reply {
        let program = command_line.split_whitespace().next().unwrap_or_default();

        let mut one_shot = self.one_shot.lock().unwrap();
        if let Some(idx) = one_shot.iter().position(|(p, _)| p == program) {
            return one_shot.remove(idx).1;
        }

        self.replies
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == program)
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::stdout(""))
    }
}

/// Decrements the in-flight counter even when the exec future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ScriptedChannel {
    device: Arc<ScriptedDevice>,
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn exec(&mut self, command_line: &str) -> Result<RawOutput> {
        let device = &self.device;
        let now = device.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&device.in_flight);
        device.max_in_flight.fetch_max(now, Ordering::SeqCst);

        device.commands.lock().unwrap().push(command_line.to_string());

        let delay = *device.exec_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match device.reply_for(command_line) {
            Reply::Output {
                exit_code,
                stdout,
                stderr,
            } => Ok(RawOutput {
                exit_code,
                stdout,
                stderr,
            }),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Reply::Reset => Err(BridgeError::connection(
                ConnectionErrorKind::Reset,
                "Connection reset by peer",
            )),
        }
    }

    async fn close(&mut self) {}
}

pub struct ScriptedConnector {
    pub device: Arc<ScriptedDevice>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _params: &ConnectionParams) -> Result<Box<dyn Channel>> {
        self.device.connects.fetch_add(1, Ordering::SeqCst);

        let remaining = self.device.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.device.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BridgeError::connection(
                ConnectionErrorKind::Unreachable,
                "ssh: connect to host phone port 8022: No route to host",
            ));
        }

        Ok(Box::new(ScriptedChannel {
            device: self.device.clone(),
        }))
    }
}

pub fn params(on_connect: Option<&str>) -> ConnectionParams {
    ConnectionParams {
        host: "phone.local".to_string(),
        port: 8022,
        principal: "u0_a123".to_string(),
        credential: Credential::Agent,
        connect_timeout: Duration::from_secs(2),
        on_connect: on_connect.map(str::to_string),
    }
}

/// Runtime over a scripted device
pub struct Harness {
    pub device: Arc<ScriptedDevice>,
    pub max_attempts: u32,
    pub default_timeout: Duration,
    pub on_connect: Option<String>,
}

impl Harness {
    pub fn new(device: Arc<ScriptedDevice>) -> Self {
        Self {
            device,
            max_attempts: 3,
            default_timeout: Duration::from_secs(5),
            on_connect: None,
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn on_connect(mut self, command: &str) -> Self {
        self.on_connect = Some(command.to_string());
        self
    }

    pub fn build(self) -> ToolRuntime {
        let session = SessionManager::new(
            Arc::new(ScriptedConnector {
                device: self.device.clone(),
            }),
            params(self.on_connect.as_deref()),
            ReconnectPolicy::with_config(self.max_attempts, 1, 5).without_jitter(),
        );

        ToolRuntime::new(
            CapabilityRegistry::builtin().expect("builtin registry"),
            session,
            ExecutionEngine::new(self.default_timeout, 1024 * 1024),
        )
    }
}
