use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use super::McpServer;
use super::invoker::ToolInvoker;
use super::protocol::{JsonRpcResponse, decode_line, parse_line};
use super::tools::ToolRegistry;
use crate::backend::Backend;
use crate::config::Config;
use crate::diagnostics;
use crate::llm::ModelClient;

/// Build the server from configuration and serve stdin/stdout until EOF
pub(crate) async fn run_stdio(config: &Config, check_on_startup: bool) -> Result<()> {
    let client = ModelClient::new(config)?;
    if check_on_startup {
        diagnostics::startup_check(&client).await;
    }

    let registry = ToolRegistry::new();
    let invoker = ToolInvoker::new(client, config.tool_timeout());
    let server = McpServer::new(registry, invoker);

    tracing::info!(
        timeout_secs = config.tool_timeout().as_secs(),
        "ready for MCP requests on stdin"
    );
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&server, stdin.lock(), stdout.lock()).await
}

/// Serve line-delimited JSON-RPC until `reader` reaches end of stream
///
/// Lines holding only whitespace get no response. Every other line gets exactly one response
/// line. Only a read or write failure on the streams ends the loop early.
pub(crate) async fn serve<B, R, W>(server: &McpServer<B>, mut reader: R, mut writer: W) -> Result<()>
where
    B: Backend,
    R: BufRead,
    W: Write,
{
    let mut line = Vec::new();
    let mut handled: u64 = 0;

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .context("Failed to read from input stream")?;
        if read == 0 {
            break;
        }

        let parsed = match decode_line(&line) {
            Ok("") => continue,
            Ok(text) => parse_line(text),
            Err(e) => Err(e),
        };

        let response = match parsed {
            Ok(request) => server.handle_request(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting unparseable line");
                JsonRpcResponse::parse_error()
            }
        };

        write_response(&mut writer, &response)?;
        handled += 1;
    }

    tracing::info!(handled, "input closed, stopping");
    Ok(())
}

/// Write one response as a single line and flush it
pub(crate) fn write_response<W: Write>(writer: &mut W, response: &JsonRpcResponse) -> Result<()> {
    serde_json::to_writer(&mut *writer, response).context("Failed to serialize response")?;
    writer
        .write_all(b"\n")
        .context("Failed to write response delimiter")?;
    writer.flush().context("Failed to flush output stream")?;
    Ok(())
}
