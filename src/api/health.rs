use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "zai-gateway is running",
        "config": {
            "models_count": state.model_router.known_model_count(),
            "client_keys_count": config.client_authentication.allowed_keys.len(),
            "anonymous_mode": state.credentials().anonymous_mode(),
            "backup_tokens_count": state.token_pool().len(),
            "features": {
                "tool_support": config.features.tool_support,
                "thinking_processing": config.features.thinking_processing.to_string(),
                "log_level": config.features.log_level,
            }
        }
    }))
}
