/// SSE (Server-Sent Events) frame parser, encoder, and stream utilities.
///
/// Handles the low-level parsing of SSE frames from a byte stream,
/// including buffering partial lines and handling field semantics per the
/// [WHATWG event stream format](https://html.spec.whatwg.org/multipage/server-sent-events.html).
use super::SseEvent;
use bytes::Bytes;
use futures_util::Stream;
use memchr::memchr_iter;
use std::collections::VecDeque;

/// Terminal sentinel of an `OpenAI` event stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

// ---------------------------------------------------------------------------
// SseParser: incremental SSE line parser
// ---------------------------------------------------------------------------

/// Incremental SSE line parser.
///
/// Feed it raw text chunks (potentially arriving in arbitrary byte
/// boundaries) and it yields fully-assembled [`SseEvent`] frames.
pub struct SseParser {
    buffer: String,
    read_offset: usize,
    event_type: Option<String>,
    data_buffer: String,
    has_data: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            read_offset: 0,
            event_type: None,
            data_buffer: String::new(),
            has_data: false,
        }
    }

    /// Feed raw text and return any complete events parsed.
    ///
    /// - `event:` sets the event type for the next frame
    /// - `data:` appends to the data buffer (one leading space stripped)
    /// - an empty line terminates a frame
    /// - `:` lines are comments; `id:`/`retry:` and unknown fields are ignored
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete events into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseEvent>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let bytes = self.buffer.as_bytes();
        let scan_start = processed_up_to;
        for rel_pos in memchr_iter(b'\n', &bytes[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let mut line = &self.buffer[processed_up_to..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            Self::process_line(
                line,
                &mut self.event_type,
                &mut self.data_buffer,
                &mut self.has_data,
                out,
            );
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Flush a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let tail = self.buffer[self.read_offset..].to_owned();
        self.buffer.clear();
        self.read_offset = 0;
        let mut out = Vec::new();
        if !tail.is_empty() {
            let line = tail.strip_suffix('\r').unwrap_or(&tail);
            Self::process_line(
                line,
                &mut self.event_type,
                &mut self.data_buffer,
                &mut self.has_data,
                &mut out,
            );
        }
        Self::process_line(
            "",
            &mut self.event_type,
            &mut self.data_buffer,
            &mut self.has_data,
            &mut out,
        );
        out.pop()
    }

    fn process_line(
        line: &str,
        event_type: &mut Option<String>,
        data_buffer: &mut String,
        has_data: &mut bool,
        events: &mut Vec<SseEvent>,
    ) {
        if line.is_empty() {
            if *has_data {
                events.push(SseEvent {
                    event: event_type.take(),
                    data: std::mem::take(data_buffer),
                });
                *has_data = false;
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if *has_data {
                data_buffer.push('\n');
            } else {
                *has_data = true;
            }
            data_buffer.push_str(value);
        } else if let Some(value) = line.strip_prefix("event:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            *event_type = Some(value.to_string());
        }
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// Format an OpenAI-style SSE frame (no event type, just data).
#[must_use]
pub fn openai_sse_frame(json: &str) -> String {
    let mut out = String::with_capacity(10 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Serialize a value into an OpenAI-style SSE frame.
#[must_use]
pub fn json_sse_frame<T: serde::Serialize>(value: &T) -> Bytes {
    match serde_json::to_string(value) {
        Ok(json) => Bytes::from(openai_sse_frame(&json)),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize SSE frame");
            Bytes::from_static(b"data: {}\n\n")
        }
    }
}

/// The `[DONE]` sentinel frame.
#[must_use]
pub fn done_frame() -> Bytes {
    Bytes::from_static(DONE_FRAME.as_bytes())
}

/// Check if an [`SseEvent`] is a terminal `[DONE]` event.
#[must_use]
pub fn is_done_event(event: &SseEvent) -> bool {
    event.data.trim() == "[DONE]"
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

struct FrameStreamState<S> {
    stream: std::pin::Pin<Box<S>>,
    parser: SseParser,
    remainder: Vec<u8>,
    parsed: Vec<SseEvent>,
    pending: VecDeque<SseEvent>,
    exhausted: bool,
}

/// Feed the decodable prefix of `bytes` to `parser`, returning how many
/// bytes were consumed. Invalid sequences become U+FFFD; only an incomplete
/// trailing sequence is left unconsumed.
fn feed_utf8(parser: &mut SseParser, out: &mut Vec<SseEvent>, mut bytes: &[u8]) -> usize {
    let total = bytes.len();
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                parser.feed_into(text, out);
                return total;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // Safety: valid_up_to is guaranteed to be a valid UTF-8 boundary.
                let text = unsafe { std::str::from_utf8_unchecked(valid) };
                parser.feed_into(text, out);
                let Some(invalid_len) = e.error_len() else {
                    return total - rest.len();
                };
                parser.feed_into("\u{FFFD}", out);
                bytes = &rest[invalid_len..];
            }
        }
    }
}

impl<S> FrameStreamState<S> {
    fn feed_bytes(&mut self, bytes: &[u8]) {
        if self.remainder.is_empty() {
            let consumed = feed_utf8(&mut self.parser, &mut self.parsed, bytes);
            self.remainder.extend_from_slice(&bytes[consumed..]);
        } else {
            self.remainder.extend_from_slice(bytes);
            let consumed = feed_utf8(&mut self.parser, &mut self.parsed, &self.remainder);
            self.remainder.drain(..consumed);
        }
        self.pending.extend(self.parsed.drain(..));
    }

    /// End of body: a truncated trailing sequence is decoded lossily and the
    /// parser flushed.
    fn finish(&mut self) {
        if !self.remainder.is_empty() {
            let tail = String::from_utf8_lossy(&self.remainder).into_owned();
            self.remainder.clear();
            self.parser.feed_into(&tail, &mut self.parsed);
        }
        self.pending.extend(self.parsed.drain(..));
        if let Some(event) = self.parser.finish() {
            self.pending.push_back(event);
        }
    }
}

/// Split a byte stream into SSE events using [`SseParser`].
///
/// Read errors from the underlying body are surfaced as `Err` items so the
/// consumer can terminate its own output cleanly. Dropping the returned
/// stream drops the byte stream and with it the underlying connection.
pub fn sse_frame_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<SseEvent, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    use futures_util::StreamExt;

    let state = FrameStreamState {
        stream: Box::pin(byte_stream),
        parser: SseParser::new(),
        remainder: Vec::new(),
        parsed: Vec::with_capacity(8),
        pending: VecDeque::with_capacity(8),
        exhausted: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.exhausted {
                return None;
            }

            match state.stream.as_mut().next().await {
                Some(Ok(bytes)) => state.feed_bytes(&bytes),
                Some(Err(err)) => {
                    state.exhausted = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.exhausted = true;
                    state.finish();
                }
            }
        }
    })
}
