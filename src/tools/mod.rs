//! Capability system
//!
//! Provides the allowlisted Termux command surface:
//! - Typed capability definitions and the built-in catalogue
//! - Command templates with optional groups
//! - Parameter validation and shell quoting
//! - Tool runtime coordinator (the protocol-facing entry point)

pub mod catalog;
pub mod registry;
pub mod runtime;
pub mod security;
pub mod template;
pub mod types;

// Re-export commonly used types
pub use registry::CapabilityRegistry;
pub use runtime::ToolRuntime;
pub use template::CommandTemplate;
pub use types::{
    CapabilityDefinition, ParamKind, ParamSpec, ParsedBody, ParsedResponse, ResultShape, ToolRequest,
    ToolResponse,
};
