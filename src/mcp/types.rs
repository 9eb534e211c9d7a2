//! JSON-RPC 2.0 message types and MCP protocol structures

use crate::tools::types::{CapabilityDefinition, ParsedResponse, ToolRequest, ToolResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Protocol revision advertised when the client does not request one
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// Inbound JSON-RPC message. A missing `id` marks a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Outbound JSON-RPC response (success or error)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ─── MCP Protocol Types ──────────────────────────────────────────────────────

/// Tool entry in a `tools/list` result
#[derive(Debug, Clone, Serialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl From<&CapabilityDefinition> for McpTool {
    fn from(definition: &CapabilityDefinition) -> Self {
        Self {
            name: definition.tool_name(),
            description: definition.description.clone(),
            input_schema: definition.input_schema(),
        }
    }
}

/// `tools/call` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

impl From<CallToolParams> for ToolRequest {
    fn from(params: CallToolParams) -> Self {
        ToolRequest {
            name: params.name,
            arguments: params.arguments.unwrap_or_default(),
        }
    }
}

/// Content block of a tool result
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// `tools/call` result
///
/// Tool-level failures are reported here with `isError`, not as JSON-RPC
/// errors, so the calling model can see them.
#[derive(Debug, Clone, Serialize)]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "structuredContent")]
    pub structured_content: Value,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    fn from_parsed(response: ParsedResponse) -> Self {
        if response.success {
            let mut structured = response.body.to_structured();
            if response.truncated {
                structured["truncated"] = Value::Bool(true);
            }
            return Self {
                content: vec![ContentBlock::Text {
                    text: response.body.to_display_text(),
                }],
                structured_content: structured,
                is_error: false,
            };
        }

        let error = response.error.unwrap_or_default();
        let output = response.body.to_display_text();
        let text = if output.is_empty() {
            error.clone()
        } else {
            format!("{}\n{}", error, output)
        };

        Self {
            content: vec![ContentBlock::Text { text }],
            structured_content: json!({
                "kind": "command_failed",
                "exit_code": response.exit_code,
                "error": error,
                "output": response.body.to_structured(),
                "truncated": response.truncated,
            }),
            is_error: true,
        }
    }
}

impl From<ToolResponse> for CallToolResult {
    fn from(response: ToolResponse) -> Self {
        match response {
            ToolResponse::Ok { response } => Self::from_parsed(response),
            ToolResponse::Error { kind, message, raw } => {
                let mut structured = json!({ "kind": kind, "message": message });
                if let Some(raw) = raw {
                    structured["raw"] = Value::String(raw);
                }
                Self {
                    content: vec![ContentBlock::Text { text: message }],
                    structured_content: structured,
                    is_error: true,
                }
            }
        }
    }
}

// ─── Standard Error Codes ────────────────────────────────────────────────────

/// Well-known JSON-RPC error codes
pub mod error_codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist or is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::{ParsedBody, ResultShape};

    #[test]
    fn test_request_notification() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#).unwrap();
        assert!(req.is_notification());

        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": "a1", "method": "ping"}"#).unwrap();
        assert_eq!(req.id, Some(json!("a1")));
    }

    #[test]
    fn test_response_serialization() {
        let ok = serde_json::to_value(JsonRpcResponse::success(json!(1), json!({}))).unwrap();
        assert_eq!(ok["jsonrpc"], "2.0");
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(JsonRpcResponse::failure(
            Value::Null,
            error_codes::METHOD_NOT_FOUND,
            "Method not found",
        ))
        .unwrap();
        assert_eq!(err["error"]["code"], -32601);
        assert!(err["id"].is_null());
        assert!(err.get("result").is_none());
    }

    #[test]
    fn test_tool_from_definition() {
        let def = CapabilityDefinition::new("battery-status", "Battery", "termux-battery-status", ResultShape::StructuredKv)
            .unwrap();
        let tool = serde_json::to_value(McpTool::from(&def)).unwrap();
        assert_eq!(tool["name"], "termux_battery_status");
        assert_eq!(tool["inputSchema"]["type"], "object");
    }

    #[test]
    fn test_call_params_null_arguments() {
        let params: CallToolParams =
            serde_json::from_str(r#"{"name": "termux_toast", "arguments": null}"#).unwrap();
        let request = ToolRequest::from(params);
        assert!(request.arguments.is_empty());
    }

    #[test]
    fn test_failed_command_is_error_result() {
        let result = CallToolResult::from(ToolResponse::Ok {
            response: ParsedResponse {
                capability: "sms-list".into(),
                success: false,
                exit_code: 1,
                body: ParsedBody::Text { text: String::new() },
                error: Some("Permission denied".into()),
                truncated: false,
            },
        });
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "Permission denied");
        assert_eq!(value["structuredContent"]["exit_code"], 1);
    }

    #[test]
    fn test_truncated_text_is_marked() {
        let result = CallToolResult::from(ToolResponse::Ok {
            response: ParsedResponse {
                capability: "clipboard-get".into(),
                success: true,
                exit_code: 0,
                body: ParsedBody::Text { text: "abc".into() },
                error: None,
                truncated: true,
            },
        });
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["isError"], false);
        assert_eq!(value["structuredContent"]["text"], "abc");
        assert_eq!(value["structuredContent"]["truncated"], true);
    }

    #[test]
    fn test_error_response_carries_kind() {
        let result = CallToolResult::from(ToolResponse::Error {
            kind: "invalid_parameter".into(),
            message: "Invalid parameter 'to': contains ';'".into(),
            raw: None,
        });
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["structuredContent"]["kind"], "invalid_parameter");
    }
}
