//! Configuration management for termux-bridge
//!
//! TOML file with defaults, overridden by command-line flags.
//! Location: ~/.termux-bridge/config.toml

use crate::cli::Args;
use crate::errors::{BridgeError, Result};
use crate::execution::ExecutionEngine;
use crate::session::{ConnectionParams, Credential, ReconnectPolicy, Secret};
use crate::tools::registry::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub ssh: SshConfig,
    pub execution: ExecutionConfig,
    pub reconnect: ReconnectConfig,
    pub capabilities: CapabilitiesConfig,
}

/// Device connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub key_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,

    /// Run once after each connect; empty string disables
    pub on_connect: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 8022,
            user: None,
            key_file: None,
            connect_timeout_secs: 10,
            on_connect: Some("termux-api-start".to_string()),
        }
    }
}

/// Command execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub default_timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: crate::execution::DEFAULT_TIMEOUT.as_secs(),
            max_output_bytes: crate::execution::DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Reconnect backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::session::retry::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: 250,
            max_delay_ms: 4000,
        }
    }
}

/// Allowlist adjustments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    /// Capability names removed from the allowlist
    pub disabled: Vec<String>,
}

impl BridgeConfig {
    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".termux-bridge").join("config.toml"))
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used if present, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|e| {
            BridgeError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&contents)
            .map_err(|e| BridgeError::ConfigError(format!("{} ({})", e, path.display())))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| BridgeError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Apply command-line overrides
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.ssh.host = Some(host.clone());
        }
        if let Some(port) = args.port {
            self.ssh.port = port;
        }
        if let Some(user) = &args.user {
            self.ssh.user = Some(user.clone());
        }
        if let Some(key_file) = &args.key_file {
            self.ssh.key_file = Some(key_file.clone());
        }
        if let Some(timeout) = args.timeout_secs {
            self.execution.default_timeout_secs = timeout;
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if let Some(host) = &self.ssh.host {
            if host.trim().is_empty() {
                return Err(BridgeError::ConfigError("ssh.host must not be empty".into()));
            }
        }
        if self.ssh.port == 0 {
            return Err(BridgeError::ConfigError("ssh.port must be non-zero".into()));
        }
        if self.ssh.connect_timeout_secs == 0 {
            return Err(BridgeError::ConfigError("ssh.connect_timeout_secs must be non-zero".into()));
        }
        if self.execution.default_timeout_secs == 0 {
            return Err(BridgeError::ConfigError(
                "execution.default_timeout_secs must be non-zero".into(),
            ));
        }
        if self.execution.max_output_bytes == 0 {
            return Err(BridgeError::ConfigError("execution.max_output_bytes must be non-zero".into()));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(BridgeError::ConfigError("reconnect.max_attempts must be non-zero".into()));
        }
        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(BridgeError::ConfigError(
                "reconnect.base_delay_ms must not exceed reconnect.max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// Connection parameters; host and user are required here
    pub fn connection_params(&self, password: Option<&str>) -> Result<ConnectionParams> {
        let host = self
            .ssh
            .host
            .clone()
            .ok_or_else(|| BridgeError::ConfigError("No device host configured (--host or TERMUX_SSH_HOST)".into()))?;
        let principal = self
            .ssh
            .user
            .clone()
            .ok_or_else(|| BridgeError::ConfigError("No SSH user configured (--user or TERMUX_SSH_USER)".into()))?;

        let credential = match (password, &self.ssh.key_file) {
            (Some(password), _) => Credential::Password(Secret::new(password)),
            (None, Some(key_file)) => Credential::KeyFile(expand_home(key_file)),
            (None, None) => Credential::Agent,
        };

        let on_connect = self
            .ssh
            .on_connect
            .as_ref()
            .map(|cmd| cmd.trim().to_string())
            .filter(|cmd| !cmd.is_empty());

        Ok(ConnectionParams {
            host,
            port: self.ssh.port,
            principal,
            credential,
            connect_timeout: Duration::from_secs(self.ssh.connect_timeout_secs),
            on_connect,
        })
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::with_config(
            self.reconnect.max_attempts,
            self.reconnect.base_delay_ms,
            self.reconnect.max_delay_ms,
        )
    }

    pub fn execution_engine(&self) -> ExecutionEngine {
        ExecutionEngine::new(
            Duration::from_secs(self.execution.default_timeout_secs),
            self.execution.max_output_bytes,
        )
    }

    /// Built-in registry minus disabled capabilities
    pub fn registry(&self) -> Result<CapabilityRegistry> {
        CapabilityRegistry::builtin()?.without(&self.capabilities.disabled)
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
