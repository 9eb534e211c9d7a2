//! termux-bridge - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Map;
use std::sync::Arc;
use termux_bridge::{
    cli::{Args, Commands},
    config::BridgeConfig,
    mcp::{McpServer, McpTool},
    session::{OpenSshConnector, SessionManager},
    tools::{CapabilityRegistry, ToolRuntime},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries the protocol stream
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn build_runtime(config: &BridgeConfig, registry: CapabilityRegistry, password: Option<&str>) -> Result<ToolRuntime> {
    let params = config
        .connection_params(password)
        .context("Incomplete connection settings")?;

    let session = SessionManager::new(
        Arc::new(OpenSshConnector::new()),
        params,
        config.reconnect_policy(),
    );

    Ok(ToolRuntime::new(registry, session, config.execution_engine()))
}

async fn serve(runtime: Arc<ToolRuntime>) -> Result<()> {
    info!(
        device = %runtime.session().params().display_target(),
        capabilities = runtime.registry().len(),
        "serving MCP on stdio"
    );

    let server = McpServer::new(runtime.clone());
    let outcome = tokio::select! {
        result = server.serve_stdio() => result.context("MCP server failed"),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted");
            Ok(())
        }
    };

    runtime.shutdown().await;
    outcome
}

fn list_capabilities(registry: &CapabilityRegistry, json: bool) -> Result<()> {
    if json {
        let tools: Vec<McpTool> = registry.definitions().into_iter().map(McpTool::from).collect();
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    for definition in registry.definitions() {
        println!("{:<28} {}", definition.tool_name(), definition.description);
    }
    Ok(())
}

async fn check(runtime: &ToolRuntime) -> Result<()> {
    let result = runtime.invoke("battery-status", &Map::new()).await;
    runtime.shutdown().await;

    let response = result.context("Device check failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_filter());

    let mut config = BridgeConfig::load(args.config.as_deref())?;
    config.apply_args(&args);
    config.validate()?;

    let registry = config.registry()?;

    match args.command() {
        Commands::Capabilities { json } => list_capabilities(&registry, json),
        Commands::Check => {
            let runtime = build_runtime(&config, registry, args.password.as_deref())?;
            check(&runtime).await
        }
        Commands::Serve => {
            let runtime = build_runtime(&config, registry, args.password.as_deref())?;
            serve(Arc::new(runtime)).await
        }
    }
}
