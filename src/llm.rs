//! Chat-completions client for an OpenAI-compatible model deployment
//!
//! This module provides the remote backend behind the `ask_model` and
//! `list_models` tools.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::Backend;
use crate::config::{BackendConfig, Config, Credential, GenerationConfig};
use crate::diagnostics::HealthStatus;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(15);

/// Model deployment client
pub struct ModelClient {
    client: reqwest::Client,
    backend: BackendConfig,
    generation: GenerationConfig,
    /// Credential, or why it could not be resolved
    credential: std::result::Result<Credential, String>,
    description: String,
}

/// Message for the chat-completions API
#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat-completions request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

/// Chat-completions response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ModelClient {
    /// Create a client from configuration, resolving the credential now
    pub fn new(config: &Config) -> Result<Self> {
        let credential = Credential::resolve(&config.backend).map_err(|e| format!("{:#}", e));
        Self::with_credential(config, credential)
    }

    pub fn with_credential(
        config: &Config,
        credential: std::result::Result<Credential, String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            description: describe_services(&config.backend, &config.generation),
            backend: config.backend.clone(),
            generation: config.generation.clone(),
            credential,
        })
    }

    /// Primary deployment followed by distinct fallbacks
    pub fn deployments(&self) -> Vec<&str> {
        let mut names = vec![self.backend.deployment.as_str()];
        for fallback in &self.backend.fallback_deployments {
            if !names.contains(&fallback.as_str()) {
                names.push(fallback.as_str());
            }
        }
        names
    }

    fn base_url(&self) -> Result<&str> {
        let endpoint = self.backend.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            bail!("Model endpoint is not configured (set backend.endpoint or MODELBRIDGE_ENDPOINT)");
        }
        Ok(endpoint)
    }

    fn credential(&self) -> Result<&Credential> {
        self.credential.as_ref().map_err(|e| anyhow!("{}", e))
    }

    fn chat_url(&self, deployment: &str) -> Result<String> {
        Ok(format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.base_url()?,
            deployment,
            self.backend.api_version
        ))
    }

    fn models_url(&self) -> Result<String> {
        Ok(format!(
            "{}/openai/models?api-version={}",
            self.base_url()?,
            self.backend.api_version
        ))
    }

    /// Run one chat completion against a single deployment
    async fn complete(&self, deployment: &str, prompt: &str) -> Result<String> {
        let url = self.chat_url(deployment)?;
        let credential = self.credential()?;

        let request = ChatRequest {
            messages: vec![
                Message {
                    role: "system",
                    content: &self.generation.system_prompt,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
        };

        tracing::debug!(deployment, "sending chat completion");
        let response = self
            .client
            .post(&url)
            .header("api-key", credential.expose())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send request to deployment '{}'", deployment))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("Model API error from '{}' ({}): {}", deployment, status, text);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        Ok(reply_text(chat))
    }

    /// Check that the endpoint is reachable and accepts the credential
    pub async fn health_check(&self) -> HealthStatus {
        let url = match self.models_url() {
            Ok(url) => url,
            Err(e) => return HealthStatus::NotConfigured(e.to_string()),
        };
        let credential = match self.credential() {
            Ok(credential) => credential,
            Err(e) => return HealthStatus::NotConfigured(e.to_string()),
        };

        let response = self
            .client
            .get(&url)
            .header("api-key", credential.expose())
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => HealthStatus::Ready,
            Ok(resp) if matches!(resp.status().as_u16(), 401 | 403) => {
                HealthStatus::Unauthorized(resp.status().as_u16())
            }
            Ok(resp) => HealthStatus::Unexpected(resp.status().as_u16()),
            Err(e) => HealthStatus::Unreachable(e.to_string()),
        }
    }
}

impl Backend for ModelClient {
    /// Ask the primary deployment, falling back through the configured
    /// alternates in order
    async fn ask(&self, prompt: &str) -> Result<String> {
        let deployments = self.deployments();
        let mut last_error = None;

        for deployment in &deployments {
            match self.complete(deployment, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(deployment, error = %format!("{:#}", e), "deployment failed");
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| anyhow!("no deployments configured"));
        if deployments.len() == 1 {
            return Err(last_error);
        }
        Err(last_error.context(format!(
            "All deployments failed ({})",
            deployments.join(", ")
        )))
    }

    fn describe(&self) -> String {
        self.description.clone()
    }

    async fn health(&self) -> String {
        self.health_check().await.summary()
    }
}

/// Text of the first choice, or a placeholder when the model returned none
fn reply_text(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| "No response generated".to_string())
}

/// Build the static capability listing returned by `list_models`
fn describe_services(backend: &BackendConfig, generation: &GenerationConfig) -> String {
    let host = reqwest::Url::parse(backend.endpoint.trim())
        .ok()
        .and_then(|url| url.host_str().map(String::from));

    let mut output = String::from("Available Model Services\n");
    output.push_str("========================\n\n");

    output.push_str(&format!("Primary deployment: {}\n", backend.deployment));
    if backend.fallback_deployments.is_empty() {
        output.push_str("Fallback deployments: none\n");
    } else {
        output.push_str(&format!(
            "Fallback deployments: {}\n",
            backend.fallback_deployments.join(", ")
        ));
    }
    output.push_str(&format!("API version: {}\n", backend.api_version));
    output.push_str(&format!(
        "Generation: max_tokens={}, temperature={}\n\n",
        generation.max_tokens, generation.temperature
    ));

    match host {
        Some(host) => output.push_str(&format!("Endpoint: {}\n", host)),
        None => output.push_str("Endpoint: not configured\n"),
    }
    if let Some(region) = &backend.region {
        output.push_str(&format!("Region: {}\n", region));
    }

    output
}
