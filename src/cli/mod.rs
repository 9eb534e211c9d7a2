//! CLI module for termux-bridge
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands};
