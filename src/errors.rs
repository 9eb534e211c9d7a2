//! Error types for the Termux bridge
//!
//! Every stage of the pipeline (registry, validator, session, engine, parser)
//! reports failures through [`BridgeError`]; the protocol adapter turns them
//! into typed tool errors.

use std::fmt;
use thiserror::Error;

/// Why a remote channel could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Host did not answer or could not be resolved
    Unreachable,

    /// The remote side refused the supplied credential
    AuthenticationRejected,

    /// Handshake did not finish within the connect deadline
    TimedOut,

    /// An established channel broke mid-request (broken pipe, reset)
    Reset,
}

impl ConnectionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionErrorKind::Unreachable => "unreachable",
            ConnectionErrorKind::AuthenticationRejected => "authentication_rejected",
            ConnectionErrorKind::TimedOut => "timed_out",
            ConnectionErrorKind::Reset => "reset",
        }
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Capability is not on the allowlist
    #[error("Command not allowed: '{name}' is not a registered capability")]
    CommandNotAllowed { name: String },

    /// Caller-supplied argument failed its schema or escaping rules
    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameter { field: String, reason: String },

    /// Remote channel could not be established or broke
    #[error("Connection error ({kind}): {message}")]
    Connection {
        kind: ConnectionErrorKind,
        message: String,
    },

    /// Remote command exceeded its deadline
    #[error("Capability '{capability}' timed out after {timeout_ms}ms")]
    ExecutionTimeout { capability: String, timeout_ms: u64 },

    /// Successful command output that could not be interpreted
    #[error("Malformed output from '{capability}': {reason}")]
    MalformedOutput {
        capability: String,
        reason: String,
        raw: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Inbound protocol framing errors
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Shorthand for a connection failure
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        BridgeError::Connection {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a parameter rejection
    pub fn invalid_parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable kind, used in protocol responses
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::CommandNotAllowed { .. } => "command_not_allowed",
            BridgeError::InvalidParameter { .. } => "invalid_parameter",
            BridgeError::Connection { .. } => "connection_error",
            BridgeError::ExecutionTimeout { .. } => "execution_timeout",
            BridgeError::MalformedOutput { .. } => "malformed_output",
            BridgeError::ConfigError(_) => "config_error",
            BridgeError::ProtocolError(_) => "protocol_error",
            BridgeError::IoError(_) => "io_error",
            BridgeError::SerializationError(_) => "serialization_error",
        }
    }

    /// Whether the adapter may replay the whole request on a fresh session.
    ///
    /// Only a channel that broke mid-request qualifies. Connect failures have
    /// already been retried by the session manager, and every other kind is
    /// deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Connection {
                kind: ConnectionErrorKind::Reset,
                ..
            }
        )
    }

    /// Connection subtype, if this is a connection error
    pub fn connection_kind(&self) -> Option<ConnectionErrorKind> {
        match self {
            BridgeError::Connection { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
