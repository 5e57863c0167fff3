//! Contract between the MCP core and the model backend it fronts.

use std::future::Future;

use anyhow::Result;

/// A remote model service the tools delegate to
pub trait Backend: Send + Sync {
    /// Send a prompt and return the model's natural-language reply
    ///
    /// Fails with a descriptive error on connectivity, authorization or
    /// backend problems.
    fn ask(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;

    /// Human-readable description of the services behind this backend
    fn describe(&self) -> String;

    /// One-line connectivity and credential status
    ///
    /// Never fails; an unhealthy backend is reported in the text.
    fn health(&self) -> impl Future<Output = String> + Send;
}
