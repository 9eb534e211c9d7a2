//! Session manager
//!
//! Owns the single remote channel. Access is serialized: `acquire()` hands
//! out a [`ChannelHandle`] that holds the session lock until it is released
//! or invalidated, so at most one command is ever in flight on the channel.
//!
//! States:
//!
//! ```text
//! Disconnected ──acquire──▶ Connecting ──ok──▶ Connected
//!       ▲                        │                 │
//!       │                        └──err──▶ Failed  │
//!       └────────────── invalidate / shutdown ─────┘
//! ```
//!
//! Reconnection happens inside `acquire()` while the lock is held, so two
//! reconnect attempts can never run concurrently.

use crate::errors::{BridgeError, ConnectionErrorKind, Result};
use crate::session::channel::{Channel, ConnectionParams, Connector, RawOutput};
use crate::session::retry::ReconnectPolicy;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Guarded session contents
struct Slot {
    channel: Option<Box<dyn Channel>>,
    last_activity: Option<Instant>,
}

/// Exclusive access to the connected channel
///
/// Dropping a handle without [`SessionManager::release`] (for example when
/// the owning request future is cancelled mid-command) discards the channel,
/// since its state can no longer be trusted.
pub struct ChannelHandle {
    guard: OwnedMutexGuard<Slot>,
    state: Arc<watch::Sender<SessionState>>,
    settled: bool,
}

impl ChannelHandle {
    /// Run a command line on the held channel
    pub async fn exec(&mut self, command_line: &str) -> Result<RawOutput> {
        match self.guard.channel.as_mut() {
            Some(channel) => channel.exec(command_line).await,
            None => Err(BridgeError::connection(
                ConnectionErrorKind::Reset,
                "channel was invalidated",
            )),
        }
    }

    /// Signal the remote side to stop the command in flight
    pub async fn cancel(&mut self) -> bool {
        match self.guard.channel.as_mut() {
            Some(channel) => channel.cancel().await,
            None => false,
        }
    }

    /// Whether the handle still holds an open channel
    pub fn is_usable(&self) -> bool {
        self.guard.channel.is_some()
    }

    async fn invalidate(&mut self) {
        if let Some(mut channel) = self.guard.channel.take() {
            channel.close().await;
            info!("session invalidated");
        }
        self.state.send_replace(SessionState::Disconnected);
    }

    fn release(mut self) {
        if self.guard.channel.is_some() {
            self.guard.last_activity = Some(Instant::now());
        }
        self.settled = true;
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        if !self.settled && self.guard.channel.take().is_some() {
            warn!("channel handle abandoned mid-request; discarding session");
            self.state.send_replace(SessionState::Disconnected);
        }
    }
}

/// Drops `Connecting` back to `Disconnected` when an `acquire()` future is
/// dropped before its connect attempt settles
struct PendingConnect<'a> {
    state: &'a watch::Sender<SessionState>,
    settled: bool,
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("connect abandoned");
            self.state.send_replace(SessionState::Disconnected);
        }
    }
}

/// Session manager
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    params: ConnectionParams,
    policy: ReconnectPolicy,
    slot: Arc<Mutex<Slot>>,
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionManager {
    /// Create a manager; no connection is made until the first `acquire()`
    pub fn new(
        connector: Arc<dyn Connector>,
        params: ConnectionParams,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            connector,
            params,
            policy,
            slot: Arc::new(Mutex::new(Slot {
                channel: None,
                last_activity: None,
            })),
            state: Arc::new(state),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Connection parameters in use
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Wait for exclusive access, connecting first if needed
    pub async fn acquire(&self) -> Result<ChannelHandle> {
        let mut guard = self.slot.clone().lock_owned().await;

        if guard.channel.is_none() {
            self.state.send_replace(SessionState::Connecting);
            let mut pending = PendingConnect {
                state: &self.state,
                settled: false,
            };
            let outcome = self.establish().await;
            pending.settled = true;

            match outcome {
                Ok(channel) => {
                    guard.channel = Some(channel);
                    guard.last_activity = Some(Instant::now());
                    self.state.send_replace(SessionState::Connected);
                    info!(device = %self.params.display_target(), "session connected");
                }
                Err(e) => {
                    self.state.send_replace(SessionState::Failed);
                    warn!(error = %e, "session connect failed");
                    return Err(e);
                }
            }
        } else if let Some(last) = guard.last_activity {
            debug!(idle_ms = last.elapsed().as_millis() as u64, "reusing session");
        }

        Ok(ChannelHandle {
            guard,
            state: self.state.clone(),
            settled: false,
        })
    }

    /// Return the channel to idle; it stays open for the next request
    pub fn release(&self, handle: ChannelHandle) {
        handle.release();
    }

    /// Close the channel and drop to Disconnected; the handle stays held
    /// until released
    pub async fn invalidate(&self, handle: &mut ChannelHandle) {
        handle.invalidate().await;
    }

    /// Tear down the session at process exit
    pub async fn shutdown(&self) {
        let mut guard = self.slot.lock().await;
        if let Some(mut channel) = guard.channel.take() {
            channel.close().await;
            info!("session closed");
        }
        self.state.send_replace(SessionState::Disconnected);
    }

    async fn establish(&self) -> Result<Box<dyn Channel>> {
        let connect_timeout = self.params.connect_timeout;

        self.policy
            .run(|attempt| async move {
                debug!(
                    attempt,
                    device = %self.params.display_target(),
                    "establishing session"
                );

                let mut channel = match timeout(connect_timeout, self.connector.connect(&self.params)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(BridgeError::connection(
                            ConnectionErrorKind::TimedOut,
                            format!("connect did not complete within {}ms", connect_timeout.as_millis()),
                        ))
                    }
                };

                if let Some(command) = &self.params.on_connect {
                    match timeout(connect_timeout, channel.exec(command)).await {
                        Ok(Ok(output)) if output.exit_code != 0 => {
                            warn!(
                                command = %command,
                                exit_code = output.exit_code,
                                "on-connect command exited non-zero"
                            );
                        }
                        Ok(Ok(_)) => debug!(command = %command, "on-connect command finished"),
                        Ok(Err(e)) => {
                            channel.close().await;
                            return Err(e);
                        }
                        Err(_) => {
                            channel.close().await;
                            return Err(BridgeError::connection(
                                ConnectionErrorKind::TimedOut,
                                format!("on-connect command '{}' did not finish", command),
                            ));
                        }
                    }
                }

                Ok(channel)
            })
            .await
    }
}
