//! Modelbridge MCP Server
//!
//! This binary speaks MCP over stdin/stdout so an orchestration host can call
//! the configured model deployment as a tool. Logs go to stderr.

use anyhow::Result;

mod backend;
mod config;
mod diagnostics;
mod llm;
mod logging;
mod mcp;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "modelbridge MCP server starting");

    let config = config::Config::load()?;
    let check = config.server.check_on_startup;
    mcp::transport::run_stdio(&config, check).await
}
