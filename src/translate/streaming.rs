use std::collections::VecDeque;
use std::convert::Infallible;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::protocol::error_shapes::{upstream_error_frame_payload, upstream_rejected_payload};
use crate::stream::{done_frame, json_sse_frame};
use crate::transport::{EventStream, UpstreamFailure};

use super::chunk::{FINISH_STOP, FINISH_TOOL_CALLS};
use super::outcome::{OutcomeReporter, RequestOutcome};
use super::route::{EventRouter, Finalization, Piece, RouteStep};
use super::{log_upstream_error, ResponseContext, Translator};

/// Re-emits the upstream events as `OpenAI` chunk frames.
pub struct StreamingTranslator {
    ctx: ResponseContext,
}

impl StreamingTranslator {
    #[must_use]
    pub fn new(ctx: ResponseContext) -> Self {
        Self { ctx }
    }

    /// The frame sequence for this request, without the HTTP wrapper.
    pub fn frames(
        self,
        upstream: Result<EventStream, UpstreamFailure>,
        reporter: OutcomeReporter,
    ) -> impl Stream<Item = Bytes> + Send + 'static {
        let state = StreamState::start(self.ctx, upstream, reporter);
        futures_util::stream::unfold(state, |mut state| async move {
            state.next_frame().await.map(|frame| (frame, state))
        })
    }
}

impl Translator for StreamingTranslator {
    async fn translate(
        self,
        upstream: Result<EventStream, UpstreamFailure>,
        reporter: OutcomeReporter,
    ) -> Response {
        let frames = self.frames(upstream, reporter).map(Ok::<Bytes, Infallible>);
        sse_ok_response(Body::from_stream(frames))
    }
}

fn sse_ok_response(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}

/// Per-request streaming state.
///
/// `terminated` is set exactly once by [`StreamState::finish`]; afterwards
/// only already queued frames are drained. Setting `events` to `None`
/// releases the upstream connection.
struct StreamState {
    ctx: ResponseContext,
    router: EventRouter,
    events: Option<EventStream>,
    pending: VecDeque<Bytes>,
    pieces: Vec<Piece>,
    terminated: bool,
    reporter: OutcomeReporter,
}

impl StreamState {
    fn start(
        ctx: ResponseContext,
        upstream: Result<EventStream, UpstreamFailure>,
        mut reporter: OutcomeReporter,
    ) -> Self {
        let router = EventRouter::new(ctx.tools_active, ctx.thinking_mode);
        let mut pending = VecDeque::with_capacity(4);
        let mut events = None;
        let mut terminated = false;

        match upstream {
            Ok(stream) => {
                pending.push_back(ctx.chunks.role_frame());
                events = Some(stream);
            }
            Err(UpstreamFailure::Transport(failure)) => {
                tracing::warn!(kind = %failure.kind, error = %failure.message, "upstream call failed");
                let payload = upstream_error_frame_payload(&failure.client_message());
                pending.push_back(json_sse_frame(&payload));
                pending.push_back(done_frame());
                terminated = true;
                reporter.report(RequestOutcome::transport(failure.kind));
            }
            Err(UpstreamFailure::Rejected { status }) => {
                tracing::debug!(status, "streaming upstream rejection as error frame");
                pending.push_back(json_sse_frame(&upstream_rejected_payload()));
                pending.push_back(done_frame());
                terminated = true;
                reporter.report(RequestOutcome::rejected());
            }
        }

        Self {
            ctx,
            router,
            events,
            pending,
            pieces: Vec::new(),
            terminated,
            reporter,
        }
    }

    async fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
            if self.terminated {
                return None;
            }
            let Some(events) = self.events.as_mut() else {
                self.finish_completed();
                continue;
            };
            match events.next().await {
                Some(Ok(event)) => {
                    let step = self.router.route(&event, &mut self.pieces);
                    self.queue_pieces();
                    match step {
                        RouteStep::Continue => {}
                        RouteStep::Complete => self.finish_completed(),
                        RouteStep::Failed(error) => {
                            log_upstream_error(&error);
                            self.finish_stopped(RequestOutcome::upstream_error());
                        }
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "upstream event stream failed");
                    self.finish_stopped(RequestOutcome::stream_error(200));
                }
                None => {
                    tracing::debug!("upstream stream ended without a completion signal");
                    self.finish_completed();
                }
            }
        }
    }

    fn queue_pieces(&mut self) {
        for piece in self.pieces.drain(..) {
            let frame = match piece {
                Piece::Content(text) => self.ctx.chunks.content_frame(text),
                Piece::Reasoning(text) => self.ctx.chunks.reasoning_frame(text),
            };
            self.pending.push_back(frame);
        }
    }

    /// Close the stream once: release the upstream, queue the terminal
    /// frames and report the outcome. Later calls do nothing.
    fn finish(&mut self, finish_reason: &str, outcome: RequestOutcome) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.events = None;
        self.pending.push_back(self.ctx.chunks.finish_frame(finish_reason));
        self.pending.push_back(done_frame());
        self.reporter.report(outcome);
    }

    fn finish_completed(&mut self) {
        if self.terminated {
            return;
        }
        let finish_reason = match self.router.finalize(self.ctx.extractor.as_ref()) {
            Finalization::ToolCalls(calls) => {
                for call in calls {
                    self.pending.push_back(self.ctx.chunks.tool_call_frame(call));
                }
                FINISH_TOOL_CALLS
            }
            Finalization::Content(Some(text)) => {
                self.pending.push_back(self.ctx.chunks.content_frame(text));
                FINISH_STOP
            }
            Finalization::Content(None) => FINISH_STOP,
        };
        self.finish(finish_reason, RequestOutcome::completed());
    }

    fn finish_stopped(&mut self, outcome: RequestOutcome) {
        self.finish(FINISH_STOP, outcome);
    }
}
