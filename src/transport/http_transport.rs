use std::fmt;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::GatewayError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_MAX_IDLE_PER_HOST: usize = 32;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

const TIMEOUT_MESSAGE: &str = "Upstream request was aborted or timed out, please retry later";
const NETWORK_MESSAGE: &str = "Network error while contacting upstream, please check connectivity";
const GENERIC_FALLBACK_MESSAGE: &str = "Failed to call upstream";

/// Class of a failed outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// The call was aborted or ran past its deadline.
    Timeout,
    /// Connection-level failure before a response arrived.
    Network,
    Generic,
}

impl TransportFailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransportFailureKind::Timeout => "timeout",
            TransportFailureKind::Network => "network",
            TransportFailureKind::Generic => "generic",
        }
    }

    /// Status used by the aggregating response for this class.
    #[must_use]
    pub fn http_status(self) -> http::StatusCode {
        match self {
            TransportFailureKind::Timeout => http::StatusCode::REQUEST_TIMEOUT,
            TransportFailureKind::Network => http::StatusCode::SERVICE_UNAVAILABLE,
            TransportFailureKind::Generic => http::StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified transport failure with the raw transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    #[must_use]
    pub fn new(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let message = err.to_string();
        let kind = if err.is_timeout() {
            TransportFailureKind::Timeout
        } else if err.is_connect() {
            TransportFailureKind::Network
        } else {
            classify_transport_message(&message)
        };
        Self { kind, message }
    }

    /// Message shown to the client for this failure.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self.kind {
            TransportFailureKind::Timeout => TIMEOUT_MESSAGE.to_string(),
            TransportFailureKind::Network => NETWORK_MESSAGE.to_string(),
            TransportFailureKind::Generic if self.message.trim().is_empty() => {
                GENERIC_FALLBACK_MESSAGE.to_string()
            }
            TransportFailureKind::Generic => self.message.clone(),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.kind, self.message)
    }
}

impl From<TransportFailure> for GatewayError {
    fn from(failure: TransportFailure) -> Self {
        GatewayError::Transport(failure.to_string())
    }
}

/// Fallback classification when the error carries no structured kind.
#[must_use]
pub(crate) fn classify_transport_message(message: &str) -> TransportFailureKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("aborted") || lower.contains("timed out") || lower.contains("timeout") {
        TransportFailureKind::Timeout
    } else if lower.contains("network")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("dns")
    {
        TransportFailureKind::Network
    } else {
        TransportFailureKind::Generic
    }
}

fn build_reqwest_client(
    timeout: Duration,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, GatewayError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout);

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| GatewayError::Transport(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    }

    builder
        .build()
        .map_err(|err| GatewayError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// HTTP client used for every outbound call to the upstream service.
///
/// The client-level timeout bounds the whole exchange including the body,
/// so a stalled event stream fails with a timeout error.
pub struct HttpTransport {
    client: reqwest::Client,
    anonymous_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport from the upstream config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the proxy URL is invalid or
    /// the client cannot be built.
    pub fn new(config: &UpstreamConfig) -> Result<Self, GatewayError> {
        let client = build_reqwest_client(
            Duration::from_secs(config.timeout_secs),
            config.proxy.as_deref(),
        )?;
        Ok(Self {
            client,
            anonymous_timeout: Duration::from_secs(config.anonymous_timeout_secs),
        })
    }

    #[must_use]
    pub fn anonymous_timeout(&self) -> Duration {
        self.anonymous_timeout
    }

    /// Send one POST with a pre-encoded JSON body. No retries.
    ///
    /// # Errors
    ///
    /// Returns a classified [`TransportFailure`] when no response arrives.
    pub async fn send_stream(
        &self,
        url: &str,
        headers: http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, TransportFailure> {
        self.client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|err| TransportFailure::from_reqwest(&err))
    }

    /// Send one GET bounded by the anonymous-credential timeout.
    ///
    /// # Errors
    ///
    /// Returns a classified [`TransportFailure`] when no response arrives.
    pub async fn get_with_short_timeout(
        &self,
        url: &str,
        headers: http::HeaderMap,
    ) -> Result<reqwest::Response, TransportFailure> {
        self.client
            .get(url)
            .headers(headers)
            .timeout(self.anonymous_timeout)
            .send()
            .await
            .map_err(|err| TransportFailure::from_reqwest(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_statuses() {
        assert_eq!(TransportFailureKind::Timeout.http_status().as_u16(), 408);
        assert_eq!(TransportFailureKind::Network.http_status().as_u16(), 503);
        assert_eq!(TransportFailureKind::Generic.http_status().as_u16(), 502);
    }

    #[test]
    fn test_client_messages() {
        let timeout = TransportFailure::new(TransportFailureKind::Timeout, "operation timed out");
        assert_eq!(timeout.client_message(), TIMEOUT_MESSAGE);
        let network = TransportFailure::new(TransportFailureKind::Network, "refused");
        assert_eq!(network.client_message(), NETWORK_MESSAGE);
        let generic = TransportFailure::new(TransportFailureKind::Generic, "tls handshake eof");
        assert_eq!(generic.client_message(), "tls handshake eof");
        let empty = TransportFailure::new(TransportFailureKind::Generic, " ");
        assert_eq!(empty.client_message(), GENERIC_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_classify_transport_message() {
        assert_eq!(
            classify_transport_message("request Aborted by peer"),
            TransportFailureKind::Timeout
        );
        assert_eq!(
            classify_transport_message("Connection refused (os error 111)"),
            TransportFailureKind::Network
        );
        assert_eq!(
            classify_transport_message("invalid certificate"),
            TransportFailureKind::Generic
        );
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let config = UpstreamConfig {
            proxy: Some("::not a url::".into()),
            ..UpstreamConfig::default()
        };
        assert!(matches!(
            HttpTransport::new(&config),
            Err(GatewayError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_is_network_or_timeout() {
        let config = UpstreamConfig::default();
        let transport = HttpTransport::new(&config).unwrap();
        let failure = transport
            .send_stream(
                "http://127.0.0.1:1/api/chat/completions",
                http::HeaderMap::new(),
                bytes::Bytes::from_static(b"{}"),
            )
            .await
            .unwrap_err();
        assert_ne!(failure.kind, TransportFailureKind::Generic);
    }
}
