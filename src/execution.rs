//! Execution engine
//!
//! Runs one rendered command line over an acquired channel under a deadline.
//! A command that overruns its deadline leaves the channel in an unknown
//! state, so the session is always invalidated afterwards; the next request
//! reconnects.

use crate::errors::{BridgeError, Result};
use crate::session::{ChannelHandle, SessionManager};
use crate::tools::types::CapabilityDefinition;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default per-command deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on captured stdout/stderr, per stream
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 2 * 1024 * 1024;

/// Raw result of one remote command
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,

    /// Whether stdout was cut at the output cap
    pub truncated: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Execution engine
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    default_timeout: Duration,
    max_output_bytes: usize,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_MAX_OUTPUT_BYTES)
    }
}

impl ExecutionEngine {
    pub fn new(default_timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            default_timeout,
            max_output_bytes,
        }
    }

    /// Deadline for a capability: its own override, else the default
    pub fn timeout_for(&self, definition: &CapabilityDefinition) -> Duration {
        definition.timeout.unwrap_or(self.default_timeout)
    }

    /// Run `command_line` on the held channel
    ///
    /// Non-zero exit codes are data, not errors. Errors are reserved for
    /// deadline expiry and transport failure; both invalidate the session.
    pub async fn execute(
        &self,
        session: &SessionManager,
        handle: &mut ChannelHandle,
        capability: &str,
        command_line: &str,
        deadline: Duration,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        debug!(capability, command = %command_line, "executing remote command");

        match timeout(deadline, handle.exec(command_line)).await {
            Ok(Ok(raw)) => {
                let (stdout, cut_stdout) = truncate_output(raw.stdout, self.max_output_bytes);
                let (stderr, cut_stderr) = truncate_output(raw.stderr, self.max_output_bytes);
                let truncated = cut_stdout;
                let duration = start.elapsed();

                if cut_stdout || cut_stderr {
                    warn!(
                        capability,
                        limit = self.max_output_bytes,
                        "output exceeded cap and was truncated"
                    );
                }

                info!(
                    capability,
                    exit_code = raw.exit_code,
                    duration_ms = duration.as_millis() as u64,
                    "remote command finished"
                );

                Ok(ExecutionResult {
                    exit_code: raw.exit_code,
                    stdout,
                    stderr,
                    duration,
                    truncated,
                })
            }
            Ok(Err(e)) => {
                warn!(capability, error = %e, "channel failed during command");
                session.invalidate(handle).await;
                Err(e)
            }
            Err(_) => {
                let cancelled = handle.cancel().await;
                let timeout_ms = deadline.as_millis() as u64;
                warn!(capability, timeout_ms, cancelled, "remote command timed out");
                session.invalidate(handle).await;
                Err(BridgeError::ExecutionTimeout {
                    capability: capability.to_string(),
                    timeout_ms,
                })
            }
        }
    }
}

/// Cut `text` to at most `limit` bytes on a char boundary
fn truncate_output(mut text: String, limit: usize) -> (String, bool) {
    if text.len() <= limit {
        return (text, false);
    }

    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    (text, true)
}
