use crate::error::ErrorCategory;

fn openai_error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest | ErrorCategory::Conflict => "invalid_request_error",
        ErrorCategory::Authentication => "authentication_error",
        ErrorCategory::NotFound => "not_found_error",
        ErrorCategory::BadGateway => "upstream_error",
        ErrorCategory::ServerError => "server_error",
    }
}

fn openai_error_code(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request",
        ErrorCategory::Authentication => "invalid_api_key",
        ErrorCategory::NotFound => "not_found",
        ErrorCategory::Conflict => "conflict",
        ErrorCategory::BadGateway => "bad_gateway",
        ErrorCategory::ServerError => "server_error",
    }
}

#[must_use]
pub(crate) fn openai_error_payload(cat: ErrorCategory, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "type": openai_error_type(cat),
            "code": openai_error_code(cat),
            "param": null,
        }
    })
}

/// In-band stream frame payload used when the upstream call itself failed.
#[must_use]
pub(crate) fn upstream_error_frame_payload(message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "type": "upstream_error",
        }
    })
}

/// Body used for both variants when the upstream rejected the call.
#[must_use]
pub(crate) fn upstream_rejected_payload() -> serde_json::Value {
    serde_json::json!({ "error": "Upstream error" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_payload_shape() {
        let body = openai_error_payload(ErrorCategory::InvalidRequest, "bad");
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["code"], "invalid_request");
        assert!(body["error"]["param"].is_null());
    }

    #[test]
    fn test_upstream_rejected_payload() {
        assert_eq!(
            upstream_rejected_payload().to_string(),
            r#"{"error":"Upstream error"}"#
        );
    }
}
