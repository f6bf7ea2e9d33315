pub mod sse;

pub use sse::{
    done_frame, is_done_event, json_sse_frame, openai_sse_frame, sse_frame_stream, SseParser,
    DONE_FRAME,
};

/// A parsed SSE frame from the upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}
