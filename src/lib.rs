//! termux-bridge - Termux:API over SSH as MCP tools
//!
//! Exposes a fixed allowlist of Termux:API commands on an Android device to
//! an MCP client. Every invocation goes through the same pipeline:
//!
//! - **Registry**: allowlisted capability definitions
//! - **Validator**: typed parameter checks and shell quoting
//! - **Session**: one lazily-connected, serialized SSH channel
//! - **Execution**: deadline-bounded remote command run
//! - **Parser**: output interpretation by declared shape
//! - **Runtime**: the adapter that drives the stages above

pub mod errors;
pub use errors::{BridgeError, Result};

pub mod cli;
pub mod config;
pub mod execution;
pub mod mcp;
pub mod parser;
pub mod session;
pub mod tools;

// Re-export commonly used types
pub use config::BridgeConfig;
pub use execution::{ExecutionEngine, ExecutionResult};
pub use session::{SessionManager, SessionState};
pub use tools::{CapabilityRegistry, ToolRuntime};
