pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;

use self::validation::validate_config;

/// Environment variable that overrides the configuration file path.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// How thinking-phase text is rewritten before it reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    /// Turn `<details>` wrappers into `<span>`.
    #[default]
    Think,
    /// Drop `<details>` wrappers entirely.
    Strip,
    /// Keep `<details>` wrappers as sent by the upstream.
    Raw,
}

impl fmt::Display for ThinkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThinkingMode::Think => write!(f, "think"),
            ThinkingMode::Strip => write!(f, "strip"),
            ThinkingMode::Raw => write!(f, "raw"),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub base_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            base_path: String::new(),
            runtime_worker_threads: None,
        }
    }
}

/// Upstream chat service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_anonymous_timeout")]
    pub anonymous_timeout_secs: u64,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default = "default_fe_version")]
    pub fe_version: String,
}

fn default_api_endpoint() -> String {
    "https://chat.z.ai/api/chat/completions".to_string()
}
fn default_origin() -> String {
    "https://chat.z.ai".to_string()
}
fn default_upstream_timeout() -> u64 {
    60
}
fn default_anonymous_timeout() -> u64 {
    10
}
fn default_fe_version() -> String {
    "prod-fe-1.0.84".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            origin: default_origin(),
            timeout_secs: default_upstream_timeout(),
            anonymous_timeout_secs: default_anonymous_timeout(),
            proxy: None,
            fe_version: default_fe_version(),
        }
    }
}

/// Upstream credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_true")]
    pub anonymous_mode: bool,
    /// Comma-separated list of long-lived backup tokens.
    #[serde(default)]
    pub backup_tokens: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            anonymous_mode: true,
            backup_tokens: String::new(),
        }
    }
}

/// Client authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientAuthConfig {
    #[serde(default)]
    pub allowed_keys: Vec<String>,
    #[serde(default)]
    pub skip_auth: bool,
}

/// One client-facing model name and the upstream model it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRouteConfig {
    pub name: String,
    pub upstream_id: String,
    pub upstream_name: String,
    #[serde(default)]
    pub thinking: bool,
    #[serde(default)]
    pub web_search: bool,
}

impl ModelRouteConfig {
    fn new(name: &str, upstream_id: &str, upstream_name: &str, thinking: bool, web_search: bool) -> Self {
        Self {
            name: name.to_string(),
            upstream_id: upstream_id.to_string(),
            upstream_name: upstream_name.to_string(),
            thinking,
            web_search,
        }
    }
}

fn default_models() -> Vec<ModelRouteConfig> {
    vec![
        ModelRouteConfig::new("GLM-4.5", "0727-360B-API", "GLM-4.5", false, false),
        ModelRouteConfig::new("GLM-4.5-Thinking", "0727-360B-API", "GLM-4.5", true, false),
        ModelRouteConfig::new("GLM-4.5-Search", "0727-360B-API", "GLM-4.5", false, true),
        ModelRouteConfig::new("GLM-4.5-Air", "0727-106B-API", "GLM-4.5-Air", false, false),
        ModelRouteConfig::new("GLM-4.6", "GLM-4-6-API-V1", "GLM-4.6", false, false),
        ModelRouteConfig::new("GLM-4.6-Thinking", "GLM-4-6-API-V1", "GLM-4.6-Thinking", true, false),
        ModelRouteConfig::new("GLM-4.6-Search", "GLM-4-6-API-V1", "GLM-4.6-Search", false, true),
    ]
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_true")]
    pub tool_support: bool,
    #[serde(default)]
    pub thinking_processing: ThinkingMode,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            tool_support: true,
            thinking_processing: ThinkingMode::default(),
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub client_authentication: ClientAuthConfig,
    #[serde(default = "default_models")]
    pub models: Vec<ModelRouteConfig>,
    #[serde(default)]
    pub features: FeaturesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            credentials: CredentialsConfig::default(),
            client_authentication: ClientAuthConfig::default(),
            models: default_models(),
            features: FeaturesConfig::default(),
        }
    }
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] or [`ConfigError::Validation`].
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Resolve the config path from `GATEWAY_CONFIG`, falling back to `config.yaml`.
#[must_use]
pub fn config_path_from_env() -> String {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.credentials.anonymous_mode);
        assert_eq!(config.upstream.timeout_secs, 60);
        assert_eq!(config.models.len(), 7);
        assert_eq!(config.features.thinking_processing, ThinkingMode::Think);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("client_authentication:\n  allowed_keys: [\"k\"]\n").unwrap();
        assert_eq!(config.upstream.anonymous_timeout_secs, 10);
        assert!(config.features.tool_support);
        assert_eq!(config.models[0].name, "GLM-4.5");
        assert!(config.credentials.backup_tokens.is_empty());
    }

    #[test]
    fn test_thinking_mode_serde() {
        let json = serde_json::to_string(&ThinkingMode::Strip).unwrap();
        assert_eq!(json, "\"strip\"");
        let mode: ThinkingMode = serde_json::from_str("\"raw\"").unwrap();
        assert_eq!(mode, ThinkingMode::Raw);
    }
}
