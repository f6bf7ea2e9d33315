use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use crate::protocol::error_shapes::upstream_rejected_payload;
use crate::transport::{EventStream, TransportFailure, UpstreamFailure};

use super::outcome::{OutcomeReporter, RequestOutcome};
use super::route::{EventRouter, Finalization, Piece, RouteStep};
use super::{log_upstream_error, ResponseContext, Translator};

/// Collects the whole upstream reply into one chat completion.
pub struct AggregatingTranslator {
    ctx: ResponseContext,
}

enum Collected {
    /// Completion signal, error event, or end of stream.
    Finished { text: String, failed: bool },
    Malformed(String),
}

impl AggregatingTranslator {
    #[must_use]
    pub fn new(ctx: ResponseContext) -> Self {
        Self { ctx }
    }

    async fn collect(router: &mut EventRouter, mut events: EventStream) -> Collected {
        let mut text = String::new();
        let mut pieces: Vec<Piece> = Vec::new();
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "upstream event stream failed");
                    return Collected::Malformed(err.to_string());
                }
            };
            let step = router.route(&event, &mut pieces);
            for piece in pieces.drain(..) {
                text.push_str(piece.text());
            }
            match step {
                RouteStep::Continue => {}
                RouteStep::Complete => return Collected::Finished { text, failed: false },
                RouteStep::Failed(error) => {
                    log_upstream_error(&error);
                    return Collected::Finished { text, failed: true };
                }
            }
        }
        Collected::Finished { text, failed: false }
    }
}

fn transport_failure_response(failure: &TransportFailure) -> Response {
    let body = serde_json::json!({
        "error": {
            "message": failure.client_message(),
            "type": "upstream_error",
            "details": failure.kind.as_str(),
        }
    });
    (failure.kind.http_status(), axum::Json(body)).into_response()
}

fn stream_error_response(message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "message": format!("Upstream stream error: {message}"),
            "type": "upstream_error",
        }
    });
    (http::StatusCode::BAD_GATEWAY, axum::Json(body)).into_response()
}

impl Translator for AggregatingTranslator {
    async fn translate(
        self,
        upstream: Result<EventStream, UpstreamFailure>,
        mut reporter: OutcomeReporter,
    ) -> Response {
        let events = match upstream {
            Ok(events) => events,
            Err(UpstreamFailure::Transport(failure)) => {
                tracing::warn!(kind = %failure.kind, error = %failure.message, "upstream call failed");
                reporter.report(RequestOutcome::transport(failure.kind));
                return transport_failure_response(&failure);
            }
            Err(UpstreamFailure::Rejected { .. }) => {
                reporter.report(RequestOutcome::rejected());
                return (
                    http::StatusCode::BAD_GATEWAY,
                    axum::Json(upstream_rejected_payload()),
                )
                    .into_response();
            }
        };

        let mut router = EventRouter::new(self.ctx.tools_active, self.ctx.thinking_mode);
        let (text, failed) = match Self::collect(&mut router, events).await {
            Collected::Finished { text, failed } => (text, failed),
            Collected::Malformed(message) => {
                reporter.report(RequestOutcome::stream_error(502));
                return stream_error_response(&message);
            }
        };

        let (content, tool_calls) = match router.finalize(self.ctx.extractor.as_ref()) {
            Finalization::ToolCalls(calls) => (None, Some(calls)),
            Finalization::Content(Some(flushed)) => (Some(flushed), None),
            Finalization::Content(None) if router.tools_active() => (Some(String::new()), None),
            Finalization::Content(None) => (Some(text), None),
        };

        reporter.report(if failed {
            RequestOutcome::upstream_error()
        } else {
            RequestOutcome::completed()
        });
        axum::Json(self.ctx.chunks.completion(content, tool_calls)).into_response()
    }
}
