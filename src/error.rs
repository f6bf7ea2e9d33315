use crate::protocol::error_shapes::openai_error_payload;

/// Error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol translation error: {0}")]
    Translation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    NotFound,
    Conflict,
    BadGateway,
    ServerError,
}

impl GatewayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            GatewayError::Auth(_) => ErrorCategory::Authentication,
            GatewayError::NotFound(_) => ErrorCategory::NotFound,
            GatewayError::Conflict(_) => ErrorCategory::Conflict,
            GatewayError::Upstream { .. }
            | GatewayError::Transport(_)
            | GatewayError::Translation(_) => ErrorCategory::BadGateway,
            GatewayError::Config(_) | GatewayError::Credential(_) | GatewayError::Internal(_) => {
                ErrorCategory::ServerError
            }
        }
    }
}

#[must_use]
pub(crate) fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => http::StatusCode::CONFLICT,
        ErrorCategory::BadGateway => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as (`status_code`, OpenAI-shaped JSON body).
#[must_use]
pub fn format_error(err: &GatewayError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    (
        http_status_for_category(cat),
        openai_error_payload(cat, &err.to_string()),
    )
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_maps_to_401() {
        let (status, body) = format_error(&GatewayError::Auth("Invalid API key".into()));
        assert_eq!(status, http::StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "authentication_error");
        assert_eq!(body["error"]["message"], "Auth error: Invalid API key");
    }

    #[test]
    fn test_credential_exhaustion_is_server_error() {
        let (status, _) = format_error(&GatewayError::Credential("no backup token".into()));
        assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_admin_categories() {
        let (status, body) = format_error(&GatewayError::Conflict("token already exists".into()));
        assert_eq!(status, http::StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "conflict");
        let (status, _) = format_error(&GatewayError::NotFound("token not found".into()));
        assert_eq!(status, http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upstream_maps_to_bad_gateway() {
        let err = GatewayError::Upstream {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.category(), ErrorCategory::BadGateway);
    }
}
