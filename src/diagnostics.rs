//! Startup connectivity check
//!
//! Results go to the log (stderr) or the terminal, never to the protocol
//! stream, and a failed check never stops the server from starting.

use colored::Colorize;

use crate::llm::ModelClient;

/// Outcome of a model endpoint health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Ready,
    Unauthorized(u16),
    Unexpected(u16),
    Unreachable(String),
    NotConfigured(String),
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, HealthStatus::Ready)
    }

    pub fn summary(&self) -> String {
        match self {
            HealthStatus::Ready => "endpoint reachable and credential accepted".to_string(),
            HealthStatus::Unauthorized(status) => {
                format!("credential rejected (HTTP {})", status)
            }
            HealthStatus::Unexpected(status) => {
                format!("endpoint reachable but returned HTTP {}", status)
            }
            HealthStatus::Unreachable(reason) => format!("endpoint unreachable: {}", reason),
            HealthStatus::NotConfigured(reason) => format!("not configured: {}", reason),
        }
    }
}

/// Check backend health and log the outcome
pub async fn startup_check(client: &ModelClient) -> HealthStatus {
    tracing::info!("checking model endpoint connectivity");
    let outcome = client.health_check().await;

    if outcome.is_ready() {
        tracing::info!(status = %outcome.summary(), "model backend ready");
    } else {
        tracing::warn!(
            status = %outcome.summary(),
            "model backend not ready; tool calls may fail"
        );
    }
    outcome
}

/// Render a terminal report for `modelbridge check`
#[allow(dead_code)] // CLI only; the server binary logs instead
pub fn render_report(outcome: &HealthStatus, client: &ModelClient) -> String {
    let mut output = format!("{}\n", "🔌 Model Backend Check".bold());
    output.push_str(&format!(
        "Checked at: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    output.push_str(&format!("Deployments: {}\n\n", client.deployments().join(", ")));

    let status = if outcome.is_ready() {
        format!("✅ {}", outcome.summary()).green()
    } else {
        format!("❌ {}", outcome.summary()).red()
    };
    output.push_str(&format!("{}\n", status));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Credential};

    #[test]
    fn test_summaries() {
        assert!(HealthStatus::Ready.is_ready());
        assert!(!HealthStatus::Unauthorized(401).is_ready());
        assert!(HealthStatus::Unauthorized(401).summary().contains("401"));
        assert!(
            HealthStatus::NotConfigured("no endpoint".to_string())
                .summary()
                .contains("no endpoint")
        );
    }

    #[test]
    fn test_startup_check_without_endpoint() {
        let client =
            ModelClient::with_credential(&Config::default(), Ok(Credential::new("k"))).unwrap();
        let outcome = tokio_test::block_on(startup_check(&client));
        assert!(matches!(outcome, HealthStatus::NotConfigured(_)));

        let report = render_report(&outcome, &client);
        assert!(report.contains("model-router"));
        assert!(report.contains("not configured"));
    }
}
