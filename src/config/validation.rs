use std::collections::HashSet;

use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_allowed_keys(config)?;
    validate_upstream(config)?;
    validate_models(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(worker_threads) = config.server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_allowed_keys(config: &AppConfig) -> Result<(), ConfigError> {
    let auth = &config.client_authentication;
    if auth.skip_auth {
        return Ok(());
    }
    if auth.allowed_keys.is_empty() {
        return Err(validation_err(
            "allowed_keys cannot be empty unless skip_auth is enabled",
        ));
    }
    for key in &auth.allowed_keys {
        if key.trim().is_empty() {
            return Err(validation_err("allowed_keys contains an empty key"));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    validate_http_url("upstream.api_endpoint", &upstream.api_endpoint)?;
    validate_http_url("upstream.origin", &upstream.origin)?;
    if let Some(proxy) = upstream.proxy.as_deref() {
        validate_http_url("upstream.proxy", proxy)?;
    }
    if upstream.timeout_secs == 0 {
        return Err(validation_err("upstream.timeout_secs must be greater than 0"));
    }
    if upstream.anonymous_timeout_secs == 0 {
        return Err(validation_err(
            "upstream.anonymous_timeout_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_http_url(field_name: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation_err(format!("{field_name} cannot be empty")));
    }
    let parsed = url::Url::parse(value)
        .map_err(|err| validation_err(format!("{field_name} is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "{field_name} must use http:// or https://"
        )));
    }
    Ok(())
}

fn validate_models(config: &AppConfig) -> Result<(), ConfigError> {
    if config.models.is_empty() {
        return Err(validation_err("models cannot be empty"));
    }
    let mut seen = HashSet::new();
    for model in &config.models {
        if model.name.trim().is_empty() {
            return Err(validation_err("models contains an entry with an empty name"));
        }
        if model.upstream_id.trim().is_empty() {
            return Err(validation_err(format!(
                "Model '{}': upstream_id cannot be empty",
                model.name
            )));
        }
        if !seen.insert(model.name.as_str()) {
            return Err(validation_err(format!(
                "Duplicate model name '{}'",
                model.name
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;

    fn make_valid_config() -> AppConfig {
        AppConfig {
            client_authentication: ClientAuthConfig {
                allowed_keys: vec!["key1".to_string()],
                skip_auth: false,
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&make_valid_config()).is_ok());
    }

    #[test]
    fn test_empty_allowed_keys() {
        let mut config = make_valid_config();
        config.client_authentication.allowed_keys.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_allowed_keys_with_skip_auth() {
        let mut config = make_valid_config();
        config.client_authentication.allowed_keys.clear();
        config.client_authentication.skip_auth = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_duplicate_model() {
        let mut config = make_valid_config();
        let first = config.models[0].clone();
        config.models.push(first);
        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("Duplicate model name"));
    }

    #[test]
    fn test_no_models_is_invalid() {
        let mut config = make_valid_config();
        config.models.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_api_endpoint() {
        let mut config = make_valid_config();
        config.upstream.api_endpoint = "not a url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_proxy_scheme() {
        let mut config = make_valid_config();
        config.upstream.proxy = Some("ftp://proxy.local".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = make_valid_config();
        config.upstream.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = make_valid_config();
        config.features.log_level = "VERBOSE".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_runtime_worker_threads() {
        let mut config = make_valid_config();
        config.server.runtime_worker_threads = Some(0);
        assert!(validate_config(&config).is_err());
    }
}
