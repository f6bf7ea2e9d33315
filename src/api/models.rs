use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{body::Body, http::StatusCode};

use crate::state::AppState;

/// List the configured client-facing models in `OpenAI` format.
#[must_use]
pub fn handler(State(state): State<Arc<AppState>>, headers: &HeaderMap) -> Response {
    if let Err(err) = state.authenticate(headers) {
        return err.into_response();
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        )],
        Body::from(state.models_response_body()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_handler_requires_key_and_lists_models() {
        let mut config = AppConfig::default();
        config.client_authentication.allowed_keys = vec!["test-key".into()];
        let state = Arc::new(AppState::from_config(config).unwrap());

        let response = handler(State(Arc::clone(&state)), &HeaderMap::new());
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer test-key".parse().unwrap());
        let response = handler(State(state), &headers);
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let ids: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids[0], "GLM-4.5");
        assert!(ids.contains(&"GLM-4.6-Search"));
        for m in body["data"].as_array().unwrap() {
            assert_eq!(m["object"], "model");
            assert_eq!(m["owned_by"], "z.ai");
        }
    }
}
