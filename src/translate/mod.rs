//! Translation of the upstream event stream into `OpenAI` responses.
//!
//! Both strategies consume the result of the single upstream call and share
//! [`route::EventRouter`] for per-event decisions, so streaming and
//! aggregated output carry the same text.

pub mod aggregate;
pub mod chunk;
pub mod outcome;
pub mod route;
pub mod streaming;
pub mod thinking;

use std::future::Future;
use std::sync::Arc;

use axum::response::Response;

use crate::config::ThinkingMode;
use crate::fc::ToolExtractor;
use crate::transport::{EventStream, UpstreamFailure};

pub use aggregate::AggregatingTranslator;
pub use chunk::ChunkFactory;
pub use outcome::{OutcomeKind, OutcomeReporter, RequestOutcome};
pub use streaming::StreamingTranslator;
pub use thinking::transform_thinking;

/// Per-request settings shared by both translators.
#[derive(Clone)]
pub struct ResponseContext {
    pub chunks: ChunkFactory,
    pub tools_active: bool,
    pub thinking_mode: ThinkingMode,
    pub extractor: Arc<dyn ToolExtractor>,
}

/// Turns the outcome of the upstream call into the client response.
///
/// Implementations report exactly one [`RequestOutcome`] through the
/// reporter, including when the client disconnects.
pub trait Translator {
    fn translate(
        self,
        upstream: Result<EventStream, UpstreamFailure>,
        reporter: OutcomeReporter,
    ) -> impl Future<Output = Response> + Send;
}

/// Log an upstream error event. Its detail never reaches the client.
pub(crate) fn log_upstream_error(error: &crate::protocol::upstream::UpstreamError) {
    tracing::warn!(
        code = ?error.code,
        detail = error.detail.as_deref().unwrap_or(""),
        "upstream reported an error mid-stream"
    );
}
