use crate::config::ClientAuthConfig;
use crate::error::GatewayError;
use http::header::AUTHORIZATION;
use rustc_hash::FxHashSet;

/// Compact key index used in hot-path authentication.
pub enum AllowedClientKeys {
    /// Authentication is switched off.
    Disabled,
    Single { bearer: Box<str> },
    Multiple(FxHashSet<String>),
}

/// Extract the bearer key from `Authorization: Bearer <key>`.
///
/// # Errors
///
/// Returns `GatewayError::Auth` when the header is missing or not a bearer token.
pub fn extract_api_key(headers: &http::HeaderMap) -> Result<&str, GatewayError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| GatewayError::Auth("Missing API key".to_string()))
}

/// Authenticate an incoming request against the pre-indexed allowed keys.
///
/// # Errors
///
/// Returns `GatewayError::Auth` when the API key is missing or invalid.
pub fn authenticate(
    headers: &http::HeaderMap,
    allowed_keys: &AllowedClientKeys,
) -> Result<(), GatewayError> {
    match allowed_keys {
        AllowedClientKeys::Disabled => Ok(()),
        AllowedClientKeys::Single { bearer } => match headers.get(AUTHORIZATION) {
            Some(value) if value.as_bytes() == bearer.as_bytes() => Ok(()),
            Some(_) => Err(GatewayError::Auth("Invalid API key".to_string())),
            None => Err(GatewayError::Auth("Missing API key".to_string())),
        },
        AllowedClientKeys::Multiple(allowed_set) => {
            let client_key = extract_api_key(headers)?;
            if allowed_set.contains(client_key) {
                Ok(())
            } else {
                Err(GatewayError::Auth("Invalid API key".to_string()))
            }
        }
    }
}

/// Build the key index from config. `skip_auth` disables the check.
#[must_use]
pub fn build_allowed_key_set(config: &ClientAuthConfig) -> AllowedClientKeys {
    if config.skip_auth {
        return AllowedClientKeys::Disabled;
    }
    let mut allowed_set: FxHashSet<String> = config
        .allowed_keys
        .iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();

    if allowed_set.len() == 1 {
        if let Some(single_key) = allowed_set.drain().next() {
            return AllowedClientKeys::Single {
                bearer: format!("Bearer {single_key}").into_boxed_str(),
            };
        }
    }
    AllowedClientKeys::Multiple(allowed_set)
}
