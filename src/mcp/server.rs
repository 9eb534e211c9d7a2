//! MCP server over line-delimited JSON-RPC
//!
//! Reads one JSON object per line, answers on the writer. A line that is
//! not UTF-8 or not JSON gets a parse error and the loop keeps reading. Each `tools/call`
//! runs on its own task so slow device commands do not block `ping` or
//! `tools/list`; the calls themselves still queue on the session lock.

use crate::errors::{BridgeError, Result};
use crate::mcp::types::{
    error_codes, CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse, McpTool, PROTOCOL_VERSION,
};
use crate::tools::runtime::ToolRuntime;
use crate::tools::types::ToolRequest;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Server name reported in `initialize`
pub const SERVER_NAME: &str = "termux-bridge";

/// MCP server
pub struct McpServer {
    runtime: Arc<ToolRuntime>,
}

impl McpServer {
    pub fn new(runtime: Arc<ToolRuntime>) -> Self {
        Self { runtime }
    }

    /// Serve on the process's stdin/stdout until stdin closes
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve until `reader` reaches EOF, then wait for in-flight calls
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer = Arc::new(Mutex::new(writer));
        let mut frames = reader.split(b'\n');
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                frame = frames.next_segment() => match frame? {
                    Some(frame) => self.handle_frame(frame, &writer, &mut in_flight).await?,
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "tool call task failed");
                    }
                }
            }
        }

        info!(pending = in_flight.len(), "input closed, draining in-flight calls");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "tool call task failed");
            }
        }

        Ok(())
    }

    async fn handle_frame<W>(
        &self,
        frame: Vec<u8>,
        writer: &Arc<Mutex<W>>,
        in_flight: &mut JoinSet<()>,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match decode_frame(frame) {
            Ok(line) => self.handle_line(line.trim(), writer, in_flight).await,
            Err(e) => {
                warn!(error = %e, "undecodable input line");
                let response = JsonRpcResponse::failure(Value::Null, error_codes::PARSE_ERROR, e.to_string());
                write_message(writer, &response).await
            }
        }
    }

    async fn handle_line<W>(
        &self,
        line: &str,
        writer: &Arc<Mutex<W>>,
        in_flight: &mut JoinSet<()>,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if line.is_empty() {
            return Ok(());
        }

        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "unparseable input line");
                let response =
                    JsonRpcResponse::failure(Value::Null, error_codes::PARSE_ERROR, format!("Parse error: {}", e));
                return write_message(writer, &response).await;
            }
        };

        let fallback_id = message.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                let response = JsonRpcResponse::failure(
                    fallback_id,
                    error_codes::INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                );
                return write_message(writer, &response).await;
            }
        };

        debug!(method = %request.method, id = ?request.id, "request received");

        if request.is_notification() {
            self.handle_notification(&request);
            return Ok(());
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result(request.params.as_ref())),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.tools_list_result()),
            "tools/call" => {
                let params = request
                    .params
                    .map(serde_json::from_value::<CallToolParams>)
                    .transpose();

                match params {
                    Ok(Some(params)) => {
                        self.spawn_call(id, params, writer.clone(), in_flight);
                        return Ok(());
                    }
                    Ok(None) => JsonRpcResponse::failure(id, error_codes::INVALID_PARAMS, "Missing params"),
                    Err(e) => JsonRpcResponse::failure(
                        id,
                        error_codes::INVALID_PARAMS,
                        format!("Invalid params: {}", e),
                    ),
                }
            }
            other => JsonRpcResponse::failure(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };

        write_message(writer, &response).await
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => info!("client initialized"),
            other => debug!(method = %other, "ignoring notification"),
        }
    }

    fn initialize_result(&self, params: Option<&Value>) -> Value {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn tools_list_result(&self) -> Value {
        let tools: Vec<McpTool> = self
            .runtime
            .registry()
            .definitions()
            .into_iter()
            .map(McpTool::from)
            .collect();
        json!({ "tools": tools })
    }

    fn spawn_call<W>(&self, id: Value, params: CallToolParams, writer: Arc<Mutex<W>>, in_flight: &mut JoinSet<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let runtime = self.runtime.clone();

        in_flight.spawn(async move {
            let result = CallToolResult::from(runtime.call(ToolRequest::from(params)).await);
            let response = match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::failure(id, error_codes::INTERNAL_ERROR, e.to_string()),
            };
            if let Err(e) = write_message(&writer, &response).await {
                warn!(error = %e, "failed to write tool result");
            }
        });
    }
}

/// One input line as text; invalid UTF-8 is a framing error
fn decode_frame(frame: Vec<u8>) -> Result<String> {
    String::from_utf8(frame).map_err(|e| {
        BridgeError::ProtocolError(format!("input line is not valid UTF-8: {}", e.utf8_error()))
    })
}

async fn write_message<W>(writer: &Mutex<W>, response: &JsonRpcResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut json = serde_json::to_string(response)?;
    json.push('\n');

    let mut writer = writer.lock().await;
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConnectionErrorKind;
    use crate::execution::ExecutionEngine;
    use crate::session::{Channel, ConnectionParams, Connector, Credential, ReconnectPolicy, SessionManager};
    use crate::tools::registry::CapabilityRegistry;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    struct OfflineConnector;

    #[async_trait]
    impl Connector for OfflineConnector {
        async fn connect(&self, _params: &ConnectionParams) -> Result<Box<dyn Channel>> {
            Err(BridgeError::connection(ConnectionErrorKind::Unreachable, "No route to host"))
        }
    }

    fn server() -> McpServer {
        let params = ConnectionParams {
            host: "phone".into(),
            port: 8022,
            principal: "u0_a1".into(),
            credential: Credential::Agent,
            connect_timeout: Duration::from_secs(1),
            on_connect: None,
        };
        let session = SessionManager::new(
            Arc::new(OfflineConnector),
            params,
            ReconnectPolicy::with_config(1, 1, 1),
        );
        let runtime = ToolRuntime::new(
            CapabilityRegistry::builtin().unwrap(),
            session,
            ExecutionEngine::default(),
        );
        McpServer::new(Arc::new(runtime))
    }

    async fn exchange(input: &str) -> Vec<Value> {
        exchange_bytes(input.as_bytes()).await
    }

    async fn exchange_bytes(input: &[u8]) -> Vec<Value> {
        let (mut client, server_end) = tokio::io::duplex(1 << 20);
        server().serve(input, server_end).await.unwrap();

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        out.lines().map(|line| serde_json::from_str(line).unwrap()).collect()
    }

    fn by_id(responses: &[Value], id: i64) -> &Value {
        responses
            .iter()
            .find(|r| r["id"] == id)
            .unwrap_or_else(|| panic!("no response with id {}", id))
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let responses = exchange(input).await;
        assert_eq!(responses.len(), 2);

        let init = by_id(&responses, 1);
        assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(init["result"]["serverInfo"]["name"], SERVER_NAME);

        let tools = by_id(&responses, 2)["result"]["tools"].as_array().unwrap();
        assert!(tools.iter().any(|t| t["name"] == "termux_battery_status"));
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let input = concat!(
            "not json\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#,
            "\n",
        );
        let responses = exchange(input).await;

        assert_eq!(responses[0]["error"]["code"], error_codes::PARSE_ERROR);
        assert_eq!(by_id(&responses, 3)["error"]["code"], error_codes::METHOD_NOT_FOUND);
        assert_eq!(by_id(&responses, 4)["error"]["code"], error_codes::INVALID_PARAMS);
        assert_eq!(by_id(&responses, 5)["result"], json!({}));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_keeps_serving() {
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        input.push(b'\n');

        let responses = exchange_bytes(&input).await;

        assert_eq!(responses.len(), 3);
        assert_eq!(by_id(&responses, 1)["result"], json!({}));
        let parse_error = responses.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(parse_error["error"]["code"], error_codes::PARSE_ERROR);
        assert!(parse_error["error"]["message"].as_str().unwrap().contains("UTF-8"));
        assert_eq!(by_id(&responses, 2)["result"], json!({}));
    }

    #[test]
    fn test_decode_frame() {
        assert_eq!(decode_frame(b"{}\r".to_vec()).unwrap(), "{}\r");
        assert!(matches!(
            decode_frame(vec![0xff, 0xfe]),
            Err(BridgeError::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_tool_errors_are_results() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"termux_reboot"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"termux_battery_status","arguments":{}}}"#,
            "\n",
        );
        let responses = exchange(input).await;

        let denied = &by_id(&responses, 6)["result"];
        assert_eq!(denied["isError"], true);
        assert_eq!(denied["structuredContent"]["kind"], "command_not_allowed");

        let offline = &by_id(&responses, 7)["result"];
        assert_eq!(offline["isError"], true);
        assert_eq!(offline["structuredContent"]["kind"], "connection_error");
    }
}
