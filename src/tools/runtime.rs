//! Tool runtime coordinator
//!
//! The single entry point for tool invocations. Drives one request through
//! lookup → validate → acquire → execute → release → parse, and maps any
//! stage's error to a typed response.

use crate::errors::Result;
use crate::execution::ExecutionEngine;
use crate::parser;
use crate::session::SessionManager;
use crate::tools::registry::CapabilityRegistry;
use crate::tools::security;
use crate::tools::types::{ExecutionRequest, ParsedResponse, ToolRequest, ToolResponse};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{info, warn};

/// Tool runtime coordinator
pub struct ToolRuntime {
    registry: CapabilityRegistry,
    session: SessionManager,
    engine: ExecutionEngine,
}

impl ToolRuntime {
    pub fn new(registry: CapabilityRegistry, session: SessionManager, engine: ExecutionEngine) -> Self {
        Self {
            registry,
            session,
            engine,
        }
    }

    /// Capability allowlist
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Shared remote session
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Execute one tool invocation
    ///
    /// # Flow
    /// 1. Resolve the name against the allowlist
    /// 2. Validate and quote every argument
    /// 3. Run the rendered command under the session lock
    /// 4. Interpret the output by declared shape
    ///
    /// A channel that breaks mid-command is replayed once on a fresh
    /// session. The session is released or invalidated on every path.
    pub async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> Result<ParsedResponse> {
        let definition = self.registry.lookup(name)?;
        let params = security::validate(definition, arguments)?;
        let request = ExecutionRequest::new(definition.name.clone(), params);
        let command_line = request.command_line(definition);
        let deadline = self.engine.timeout_for(definition);

        let mut replayed = false;
        let result = loop {
            let mut handle = self.session.acquire().await?;
            let outcome = self
                .engine
                .execute(&self.session, &mut handle, &request.capability, &command_line, deadline)
                .await;
            self.session.release(handle);

            match outcome {
                Err(e) if e.is_retryable() && !replayed => {
                    warn!(capability = %request.capability, error = %e, "channel reset mid-request, replaying once");
                    replayed = true;
                }
                other => break other?,
            }
        };

        parser::parse(definition, &result)
    }

    /// Execute a request and wrap the outcome for the protocol layer
    pub async fn call(&self, request: ToolRequest) -> ToolResponse {
        let start = Instant::now();

        match self.invoke(&request.name, &request.arguments).await {
            Ok(response) => {
                info!(
                    tool = %request.name,
                    success = response.success,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "tool call complete"
                );
                ToolResponse::Ok { response }
            }
            Err(e) => {
                warn!(
                    tool = %request.name,
                    kind = e.kind(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "tool call failed"
                );
                ToolResponse::from_error(&e)
            }
        }
    }

    /// Close the remote session
    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}
