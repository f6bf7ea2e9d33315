mod request_id;

use std::sync::Arc;

use bytes::Bytes;

use crate::auth::{authenticate, build_allowed_key_set, AllowedClientKeys};
use crate::config::AppConfig;
use crate::credentials::{
    AnonymousTokenSource, BackupTokenPool, CredentialResolver, HttpAnonymousTokenSource,
};
use crate::error::GatewayError;
use crate::fc::{JsonToolExtractor, ToolExtractor};
use crate::routing::ModelRouter;
use crate::transport::HttpTransport;
use crate::util::unix_now_secs;

use request_id::RequestIdGenerator;

/// Identifiers minted for one chat request.
#[derive(Debug, Clone)]
pub struct RequestIds {
    /// `chatcmpl-<hex>`, shown to the client.
    pub completion_id: String,
    pub chat_id: String,
    pub message_id: String,
}

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: Arc<HttpTransport>,
    pub model_router: ModelRouter,
    credentials: CredentialResolver,
    extractor: Arc<dyn ToolExtractor>,
    models_response_body: Bytes,
    infra: InfraState,
}

struct InfraState {
    allowed_client_keys: AllowedClientKeys,
    request_ids: RequestIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: Arc<HttpTransport>,
        model_router: ModelRouter,
        credentials: CredentialResolver,
        allowed_client_keys: AllowedClientKeys,
    ) -> Self {
        let models_response_body = build_models_response_body(&model_router, unix_now_secs());
        Self {
            config,
            transport,
            model_router,
            credentials,
            extractor: Arc::new(JsonToolExtractor),
            models_response_body,
            infra: InfraState {
                allowed_client_keys,
                request_ids: RequestIdGenerator::new(),
            },
        }
    }

    /// Wire up the default collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the HTTP client cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self, GatewayError> {
        let transport = Arc::new(HttpTransport::new(&config.upstream)?);
        let pool = Arc::new(BackupTokenPool::from_delimited_list(
            &config.credentials.backup_tokens,
        ));
        let anonymous = config.credentials.anonymous_mode.then(|| {
            Arc::new(HttpAnonymousTokenSource::new(
                Arc::clone(&transport),
                &config.upstream.origin,
            )) as Arc<dyn AnonymousTokenSource>
        });
        let credentials = CredentialResolver::new(anonymous, pool);
        let model_router = ModelRouter::new(&config);
        let allowed_client_keys = build_allowed_key_set(&config.client_authentication);
        Ok(Self::new(
            config,
            transport,
            model_router,
            credentials,
            allowed_client_keys,
        ))
    }

    /// Authenticate a request using the prebuilt key index.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Auth` when the API key is missing or invalid.
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<(), GatewayError> {
        authenticate(headers, &self.infra.allowed_client_keys)
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    #[must_use]
    pub fn token_pool(&self) -> &Arc<BackupTokenPool> {
        self.credentials.pool()
    }

    #[must_use]
    pub fn extractor(&self) -> Arc<dyn ToolExtractor> {
        Arc::clone(&self.extractor)
    }

    #[must_use]
    pub fn next_request_ids(&self) -> RequestIds {
        let seq = self.infra.request_ids.next_seq();
        let (chat_id, message_id) = self.infra.request_ids.upstream_ids(seq);
        RequestIds {
            completion_id: self.infra.request_ids.completion_id(seq),
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
        }
    }

    #[must_use]
    pub fn models_response_body(&self) -> Bytes {
        self.models_response_body.clone()
    }
}

fn build_models_response_body(router: &ModelRouter, created: u64) -> Bytes {
    let data: Vec<serde_json::Value> = router
        .model_names()
        .map(|name| {
            serde_json::json!({
                "id": name,
                "object": "model",
                "created": created,
                "owned_by": "z.ai",
            })
        })
        .collect();
    let body = serde_json::json!({ "object": "list", "data": data });
    Bytes::from(body.to_string())
}
