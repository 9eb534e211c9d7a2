//! Command-line argument parsing for termux-bridge
//!
//! Provides clap-based CLI with subcommands and verbosity control. Every
//! connection flag can also come from a `TERMUX_SSH_*` environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// termux-bridge - Termux:API commands as MCP tools, over SSH
#[derive(Parser, Debug)]
#[command(name = "termux-bridge")]
#[command(version)]
#[command(about = "Expose an Android device's Termux:API commands as MCP tools over SSH", long_about = None)]
pub struct Args {
    /// Device host name or address
    #[arg(long, env = "TERMUX_SSH_HOST")]
    pub host: Option<String>,

    /// SSH port (Termux sshd listens on 8022)
    #[arg(long, env = "TERMUX_SSH_PORT")]
    pub port: Option<u16>,

    /// SSH user (the Termux app user, e.g. u0_a123)
    #[arg(short, long, env = "TERMUX_SSH_USER")]
    pub user: Option<String>,

    /// Private key file
    #[arg(long, env = "TERMUX_SSH_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// SSH password (prefer the environment variable)
    #[arg(long, env = "TERMUX_SSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Default per-command timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Verbosity level: default (info), -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,

    /// List the enabled capabilities
    Capabilities {
        /// Print the MCP tool definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect to the device and read the battery status
    Check,
}

impl Args {
    /// Subcommand to run, `serve` when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }

    /// Default tracing filter for the verbosity flags
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
