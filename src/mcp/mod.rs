//! Model Context Protocol surface
//!
//! Publishes every registered capability as an MCP tool over line-delimited
//! JSON-RPC 2.0 on stdio.

pub mod server;
pub mod types;

pub use server::McpServer;
pub use types::{CallToolResult, JsonRpcRequest, JsonRpcResponse, McpTool};
