//! `POST /v1/chat/completions`: builds the upstream request, resolves a
//! credential, performs the single upstream call and hands the result to the
//! streaming or aggregating translator.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN, REFERER};

use crate::config::{ModelRouteConfig, UpstreamConfig};
use crate::credentials::{Credential, CredentialSource};
use crate::error::GatewayError;
use crate::fc::{build_upstream_messages, tool_support_active};
use crate::observability::log_request_outcome;
use crate::protocol::openai::OpenAiChatRequest;
use crate::protocol::upstream::{BackgroundTasks, ModelItem, UpstreamFeatures, UpstreamRequest};
use crate::state::{AppState, RequestIds};
use crate::translate::{
    AggregatingTranslator, ChunkFactory, OutcomeReporter, ResponseContext, StreamingTranslator,
    Translator,
};
use crate::transport::call_upstream;
use crate::util::unix_now_secs;

const SEARCH_MCP_SERVER: &str = "deep-web-search";
const X_FE_VERSION: HeaderName = HeaderName::from_static("x-fe-version");

pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handler_inner(state, headers, body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "chat request rejected");
            err.into_response()
        }
    }
}

async fn handler_inner(
    state: Arc<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let started = Instant::now();
    state.authenticate(&headers)?;
    let request = parse_chat_request(&body)?;

    let target = state
        .model_router
        .resolve(&request.model)
        .ok_or_else(|| GatewayError::Config("no models configured".into()))?;
    if target.fallback {
        tracing::debug!(
            model = %request.model,
            fallback = %target.route.name,
            "unknown model, using default route"
        );
    }

    let tools_active = tool_support_active(&state.config.features, &request);
    let ids = state.next_request_ids();
    let upstream_request = build_upstream_request(target.route, &request, &ids, tools_active);
    let upstream_body = serde_json::to_vec(&upstream_request)
        .map_err(|e| GatewayError::Internal(format!("failed to encode upstream request: {e}")))?;

    tracing::debug!(
        request_id = %ids.completion_id,
        model = %request.model,
        upstream_model = %target.route.upstream_id,
        stream = request.stream,
        tools_active,
        messages = upstream_request.messages.len(),
        "forwarding chat request"
    );

    let credential = state.credentials().resolve().await?;
    let upstream_headers =
        build_upstream_headers(&state.config.upstream, &credential, &ids.chat_id)?;

    let reporter = outcome_reporter(&state, &ids.completion_id, &request.model, credential, started);
    let upstream = call_upstream(
        &state.transport,
        &state.config.upstream.api_endpoint,
        upstream_headers,
        Bytes::from(upstream_body),
    )
    .await;

    let ctx = ResponseContext {
        chunks: ChunkFactory::new(ids.completion_id, unix_now_secs(), request.model),
        tools_active,
        thinking_mode: state.config.features.thinking_processing,
        extractor: state.extractor(),
    };
    let response = if request.stream {
        StreamingTranslator::new(ctx).translate(upstream, reporter).await
    } else {
        AggregatingTranslator::new(ctx)
            .translate(upstream, reporter)
            .await
    };
    Ok(response)
}

fn parse_chat_request(body: &Bytes) -> Result<OpenAiChatRequest, GatewayError> {
    let request: OpenAiChatRequest = serde_json::from_slice(body).map_err(|e| {
        GatewayError::InvalidRequest(format!("Invalid OpenAI Chat request body: {e}"))
    })?;
    if request.messages.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "messages must not be empty".into(),
        ));
    }
    Ok(request)
}

/// Outcome callback: one INFO log line, plus health bookkeeping for backup
/// credentials.
fn outcome_reporter(
    state: &AppState,
    request_id: &str,
    model: &str,
    credential: Credential,
    started: Instant,
) -> OutcomeReporter {
    let pool = Arc::clone(state.token_pool());
    let request_id = request_id.to_string();
    let model = model.to_string();
    OutcomeReporter::new(move |outcome| {
        log_request_outcome(&request_id, &model, &credential, &outcome, started);
        if credential.source == CredentialSource::Backup {
            pool.record_result(&credential.value, outcome.success);
        }
    })
}

pub(crate) fn build_upstream_request(
    route: &ModelRouteConfig,
    request: &OpenAiChatRequest,
    ids: &RequestIds,
    tools_active: bool,
) -> UpstreamRequest {
    let mcp_servers = if route.web_search {
        vec![SEARCH_MCP_SERVER.to_string()]
    } else {
        Vec::new()
    };
    UpstreamRequest {
        stream: true,
        chat_id: ids.chat_id.clone(),
        id: ids.message_id.clone(),
        model: route.upstream_id.clone(),
        messages: build_upstream_messages(request, tools_active),
        params: serde_json::Map::new(),
        features: UpstreamFeatures {
            enable_thinking: route.thinking,
            web_search: route.web_search,
            auto_web_search: route.web_search,
        },
        background_tasks: BackgroundTasks::default(),
        mcp_servers,
        model_item: ModelItem {
            id: route.upstream_id.clone(),
            name: route.upstream_name.clone(),
            owned_by: "openai".to_string(),
        },
        tool_servers: Vec::new(),
        variables: prompt_variables(),
    }
}

fn prompt_variables() -> serde_json::Map<String, serde_json::Value> {
    let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut variables = serde_json::Map::new();
    variables.insert("{{USER_NAME}}".into(), "User".into());
    variables.insert("{{USER_LOCATION}}".into(), "Unknown".into());
    variables.insert("{{CURRENT_DATETIME}}".into(), now.into());
    variables
}

pub(crate) fn build_upstream_headers(
    upstream: &UpstreamConfig,
    credential: &Credential,
    chat_id: &str,
) -> Result<HeaderMap, GatewayError> {
    let origin = upstream.origin.trim_end_matches('/');
    let invalid = |what: &str| GatewayError::Config(format!("invalid upstream header value for {what}"));

    let mut headers = HeaderMap::with_capacity(6);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", credential.value))
            .map_err(|_| GatewayError::Credential("credential is not a valid header value".into()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ORIGIN,
        HeaderValue::from_str(origin).map_err(|_| invalid("Origin"))?,
    );
    headers.insert(
        REFERER,
        HeaderValue::from_str(&format!("{origin}/c/{chat_id}")).map_err(|_| invalid("Referer"))?,
    );
    headers.insert(
        X_FE_VERSION,
        HeaderValue::from_str(&upstream.fe_version).map_err(|_| invalid("X-FE-Version"))?,
    );
    Ok(headers)
}
