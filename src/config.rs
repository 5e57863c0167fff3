use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENDPOINT_ENV: &str = "MODELBRIDGE_ENDPOINT";
pub const DEPLOYMENT_ENV: &str = "MODELBRIDGE_DEPLOYMENT";
pub const TIMEOUT_ENV: &str = "MODELBRIDGE_TOOL_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default)]
    pub fallback_deployments: Vec<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Name of the environment variable holding the credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: default_deployment(),
            fallback_deployments: Vec::new(),
            api_version: default_api_version(),
            region: None,
            api_key_env: default_api_key_env(),
            api_key_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub check_on_startup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            check_on_startup: true,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_deployment() -> String {
    "model-router".to_string()
}

fn default_api_version() -> String {
    "2024-10-21".to_string()
}

fn default_api_key_env() -> String {
    "MODELBRIDGE_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from ~/.modelbridge/config.toml, then apply
    /// environment overrides. Falls back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file without environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override file values with environment variables looked up via `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = non_blank(ENDPOINT_ENV) {
            self.backend.endpoint = endpoint;
        }
        if let Some(deployment) = non_blank(DEPLOYMENT_ENV) {
            self.backend.deployment = deployment;
        }
        if let Some(secs) = non_blank(TIMEOUT_ENV) {
            self.server.tool_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", TIMEOUT_ENV))?;
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.server.tool_timeout_secs.max(1))
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("config.toml"))
    }

    /// Get the modelbridge data directory (~/.modelbridge)
    pub fn data_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".modelbridge"))
    }
}

/// API credential resolved at runtime; never stored in the config file
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Resolve the credential from the configured env var, then the key file
    pub fn resolve(backend: &BackendConfig) -> Result<Self> {
        Self::resolve_with(backend, |key| std::env::var(key).ok())
    }

    pub fn resolve_with<F>(backend: &BackendConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(&backend.api_key_env) {
            let key = key.trim();
            if !key.is_empty() {
                return Ok(Self::new(key));
            }
        }

        let Some(path) = &backend.api_key_file else {
            bail!(
                "No API credential: set {} or configure backend.api_key_file",
                backend.api_key_env
            );
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read API key file {}", path.display()))?;
        let key = raw.trim();
        if key.is_empty() {
            bail!("API key file {} is empty", path.display());
        }
        Ok(Self::new(key))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.deployment, "model-router");
        assert_eq!(config.backend.api_version, "2024-10-21");
        assert_eq!(config.generation.max_tokens, 1000);
        assert_eq!(config.server.tool_timeout_secs, 60);
        assert!(config.server.check_on_startup);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("absent.toml")).unwrap();
        assert!(config.backend.endpoint.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[backend]\nendpoint = \"https://example.openai.azure.com\"\nfallback_deployments = [\"phi-4\"]\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend.endpoint, "https://example.openai.azure.com");
        assert_eq!(config.backend.fallback_deployments, vec!["phi-4"]);
        assert_eq!(config.backend.deployment, "model-router");
        assert_eq!(config.generation.temperature, 0.7);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[backend\nendpoint=").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_default_config_file_parses() {
        let config: Config = toml::from_str(include_str!("../default_config.toml")).unwrap();
        assert_eq!(config.backend.api_key_env, "MODELBRIDGE_API_KEY");
        assert_eq!(config.server.tool_timeout_secs, 60);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                (ENDPOINT_ENV, "https://override.example"),
                (DEPLOYMENT_ENV, "  "),
                (TIMEOUT_ENV, "15"),
            ]))
            .unwrap();

        assert_eq!(config.backend.endpoint, "https://override.example");
        assert_eq!(config.backend.deployment, "model-router");
        assert_eq!(config.tool_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[(TIMEOUT_ENV, "soon")])).is_err());
    }

    #[test]
    fn test_credential_from_env() {
        let backend = BackendConfig::default();
        let credential =
            Credential::resolve_with(&backend, env(&[("MODELBRIDGE_API_KEY", " secret \n")]))
                .unwrap();
        assert_eq!(credential.expose(), "secret");
        assert_eq!(format!("{:?}", credential), "Credential(<redacted>)");
    }

    #[test]
    fn test_credential_from_file() {
        let temp = TempDir::new().unwrap();
        let key_path = temp.path().join("key");
        std::fs::write(&key_path, "from-file\n").unwrap();

        let backend = BackendConfig {
            api_key_file: Some(key_path),
            ..BackendConfig::default()
        };
        let credential = Credential::resolve_with(&backend, env(&[])).unwrap();
        assert_eq!(credential.expose(), "from-file");
    }

    #[test]
    fn test_missing_credential() {
        let err = Credential::resolve_with(&BackendConfig::default(), env(&[])).unwrap_err();
        assert!(err.to_string().contains("MODELBRIDGE_API_KEY"));
    }
}
