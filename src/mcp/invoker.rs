use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;

use super::tools::{ToolName, ToolRegistry};
use crate::backend::Backend;

/// Failure of a single tool call
#[derive(Debug, Error)]
pub(crate) enum InvokeError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    Failed(String),

    #[error("Tool '{tool}' timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },
}

/// Runs registered tools against the backend, one call at a time
pub(crate) struct ToolInvoker<B> {
    backend: B,
    timeout: Duration,
}

impl<B: Backend> ToolInvoker<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Invoke `name` with `args`, bounded by the configured timeout
    pub async fn invoke(
        &self,
        registry: &ToolRegistry,
        name: &str,
        args: &Value,
    ) -> Result<String, InvokeError> {
        let tool = registry
            .lookup(name)
            .ok_or_else(|| InvokeError::UnknownTool(name.to_string()))?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.run(tool, args)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(text)) => {
                tracing::info!(tool = name, elapsed_ms, "tool call succeeded");
                Ok(text)
            }
            Ok(Err(e)) => {
                tracing::warn!(tool = name, elapsed_ms, error = %e, "tool call failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(tool = name, elapsed_ms, "tool call timed out");
                Err(InvokeError::TimedOut {
                    tool: name.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }

    async fn run(&self, tool: ToolName, args: &Value) -> Result<String, InvokeError> {
        match tool {
            ToolName::AskModel => {
                let prompt = build_prompt(args)?;
                self.backend
                    .ask(&prompt)
                    .await
                    .map_err(|e| InvokeError::Failed(format!("{:#}", e)))
            }
            ToolName::ListModels => Ok(self.backend.describe()),
            ToolName::HealthCheck => Ok(self.backend.health().await),
        }
    }
}

/// Compose the `ask_model` prompt from its arguments
fn build_prompt(args: &Value) -> Result<String, InvokeError> {
    let question = args
        .get("question")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InvokeError::Failed("missing required argument: question".to_string()))?;

    match args.get("context").and_then(|v| v.as_str()) {
        Some(context) if !context.trim().is_empty() => {
            Ok(format!("{}\n\nQuery: {}", context, question))
        }
        _ => Ok(question.to_string()),
    }
}
