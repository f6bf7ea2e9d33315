use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::transport::HttpTransport;

/// Source of short-lived anonymous upstream credentials.
pub trait AnonymousTokenSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<String, GatewayError>>;
}

#[derive(Debug, Deserialize)]
struct AnonymousTokenReply {
    #[serde(default)]
    token: Option<String>,
}

/// Fetches a fresh token from `GET {origin}/api/v1/auths/`.
pub struct HttpAnonymousTokenSource {
    transport: Arc<HttpTransport>,
    url: String,
    origin: String,
}

impl HttpAnonymousTokenSource {
    #[must_use]
    pub fn new(transport: Arc<HttpTransport>, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        Self {
            transport,
            url: format!("{origin}/api/v1/auths/"),
            origin,
        }
    }

    fn headers(&self) -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::ACCEPT, http::HeaderValue::from_static("application/json"));
        if let Ok(value) = http::HeaderValue::from_str(&self.origin) {
            headers.insert(http::header::ORIGIN, value);
        }
        if let Ok(value) = http::HeaderValue::from_str(&format!("{}/", self.origin)) {
            headers.insert(http::header::REFERER, value);
        }
        headers
    }

    async fn fetch_token(&self) -> Result<String, GatewayError> {
        let response = self
            .transport
            .get_with_short_timeout(&self.url, self.headers())
            .await
            .map_err(GatewayError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Credential(format!(
                "anonymous token request returned status {}",
                status.as_u16()
            )));
        }
        let reply: AnonymousTokenReply = response.json().await.map_err(|err| {
            GatewayError::Credential(format!("invalid anonymous token reply: {err}"))
        })?;
        reply
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GatewayError::Credential("anonymous token reply was empty".into()))
    }
}

impl AnonymousTokenSource for HttpAnonymousTokenSource {
    fn fetch(&self) -> BoxFuture<'_, Result<String, GatewayError>> {
        Box::pin(self.fetch_token())
    }
}
