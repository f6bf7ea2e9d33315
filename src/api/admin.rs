//! Backup token management under `/v1/admin/tokens`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::credentials::{mask_token, BackupTokenStatus};
use crate::error::GatewayError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenListBody {
    #[serde(default)]
    tokens: String,
}

pub async fn handler(
    State(state): State<Arc<AppState>>,
    method: &Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(err) = state.authenticate(headers) {
        return err.into_response();
    }
    let result = match *method {
        Method::GET => Ok(list_tokens(&state)),
        Method::POST => add_token(&state, &body),
        Method::DELETE => remove_token(&state, &body),
        Method::PUT => replace_tokens(&state, &body),
        _ => Ok(StatusCode::METHOD_NOT_ALLOWED.into_response()),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a Bytes) -> Result<T, GatewayError> {
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid token admin body: {e}")))
}

fn list_tokens(state: &AppState) -> Response {
    let tokens: Vec<BackupTokenStatus> = state
        .token_pool()
        .status()
        .into_iter()
        .map(|row| BackupTokenStatus {
            token: mask_token(&row.token),
            ..row
        })
        .collect();
    Json(json!({
        "anonymous_mode": state.credentials().anonymous_mode(),
        "tokens": tokens,
    }))
    .into_response()
}

fn add_token(state: &AppState, body: &Bytes) -> Result<Response, GatewayError> {
    let TokenBody { token } = parse_body(body)?;
    let token = token.trim();
    if token.is_empty() {
        return Err(GatewayError::InvalidRequest("token must not be empty".into()));
    }
    if !state.token_pool().add(token) {
        return Err(GatewayError::Conflict("token already exists".into()));
    }
    tracing::info!(token = %mask_token(token), "backup token added");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "token": mask_token(token), "total": state.token_pool().len() })),
    )
        .into_response())
}

fn remove_token(state: &AppState, body: &Bytes) -> Result<Response, GatewayError> {
    let TokenBody { token } = parse_body(body)?;
    let token = token.trim();
    if !state.token_pool().remove(token) {
        return Err(GatewayError::NotFound("token not found".into()));
    }
    tracing::info!(token = %mask_token(token), "backup token removed");
    Ok(Json(json!({ "token": mask_token(token), "total": state.token_pool().len() })).into_response())
}

fn replace_tokens(state: &AppState, body: &Bytes) -> Result<Response, GatewayError> {
    let TokenListBody { tokens } = parse_body(body)?;
    let pool = state.token_pool();
    pool.load_from_delimited_list(&tokens);
    tracing::info!(total = pool.len(), "backup token pool replaced");
    Ok(Json(json!({ "total": pool.len() })).into_response())
}
