//! Remote session layer
//!
//! Components:
//! - Channel: transport seam (`Connector` opens, `Channel` runs commands)
//! - OpenSSH: ControlMaster-backed channel over the system ssh client
//! - Manager: single shared session with serialized acquire/release
//! - Retry: bounded exponential backoff for reconnects

pub mod channel;
pub mod manager;
pub mod openssh;
pub mod retry;

// Re-export key types
pub use channel::{Channel, ConnectionParams, Connector, Credential, RawOutput, Secret};
pub use manager::{ChannelHandle, SessionManager, SessionState};
pub use openssh::OpenSshConnector;
pub use retry::ReconnectPolicy;
