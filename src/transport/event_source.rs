//! Lazy, validated upstream event sequence.
//!
//! The body is only read when the consumer polls for the next event;
//! dropping the [`EventStream`] drops the response body and releases the
//! connection.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::GatewayError;
use crate::protocol::upstream::UpstreamEvent;
use crate::stream::{is_done_event, sse_frame_stream, SseEvent};

use super::http_transport::{HttpTransport, TransportFailure};

pub type EventStream = Pin<Box<dyn Stream<Item = Result<UpstreamEvent, GatewayError>> + Send>>;

/// Why the single upstream call produced no event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    Transport(TransportFailure),
    /// The upstream answered with a non-2xx status.
    Rejected { status: u16 },
}

fn decode_event(frame: &SseEvent) -> Option<Result<UpstreamEvent, GatewayError>> {
    if frame.data.trim().is_empty() || is_done_event(frame) {
        return None;
    }
    Some(
        serde_json::from_str::<UpstreamEvent>(&frame.data).map_err(|err| {
            GatewayError::Translation(format!("invalid upstream event: {err}"))
        }),
    )
}

/// Build an [`EventStream`] over any SSE byte stream.
pub fn event_stream_from_bytes<S, E>(byte_stream: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let events = sse_frame_stream(byte_stream).filter_map(|item| {
        let decoded = match item {
            Ok(frame) => decode_event(&frame),
            Err(err) => Some(Err(GatewayError::Transport(format!(
                "upstream stream read failed: {err}"
            )))),
        };
        std::future::ready(decoded)
    });
    Box::pin(events)
}

/// Wrap a successful upstream response.
#[must_use]
pub fn open(response: reqwest::Response) -> EventStream {
    event_stream_from_bytes(response.bytes_stream())
}

/// Perform the single outbound call and open its event stream.
///
/// A non-2xx body is read for debug logging on a detached task so it never
/// delays the client response.
///
/// # Errors
///
/// Returns [`UpstreamFailure::Transport`] when no response arrives and
/// [`UpstreamFailure::Rejected`] for a non-2xx status.
pub async fn call_upstream(
    transport: &HttpTransport,
    url: &str,
    headers: http::HeaderMap,
    body: Bytes,
) -> Result<EventStream, UpstreamFailure> {
    let response = transport
        .send_stream(url, headers, body)
        .await
        .map_err(UpstreamFailure::Transport)?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "upstream rejected chat request");
        if tracing::enabled!(tracing::Level::DEBUG) {
            tokio::spawn(async move {
                match response.text().await {
                    Ok(text) => tracing::debug!(status = status.as_u16(), body = %text, "upstream error body"),
                    Err(err) => tracing::debug!(error = %err, "failed to read upstream error body"),
                }
            });
        }
        return Err(UpstreamFailure::Rejected {
            status: status.as_u16(),
        });
    }

    Ok(open(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::upstream::Phase;

    fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes, std::io::Error>> {
        parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect()
    }

    #[tokio::test]
    async fn test_decodes_events_and_skips_done() {
        let stream = event_stream_from_bytes(futures_util::stream::iter(chunks(&[
            "data: {\"data\":{\"phase\":\"answer\",\"delta_content\":\"Hi\"}}\n\n",
            "data: [DONE]\n\n",
        ])));
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.phase(), Phase::Answer);
        assert_eq!(event.text(), "Hi");
    }

    #[tokio::test]
    async fn test_malformed_event_is_translation_error() {
        let stream = event_stream_from_bytes(futures_util::stream::iter(chunks(&[
            "data: {not json}\n\n",
        ])));
        let events: Vec<_> = stream.collect().await;
        assert!(matches!(events[0], Err(GatewayError::Translation(_))));
    }

    #[tokio::test]
    async fn test_read_error_is_transport_error() {
        let items: Vec<Result<Bytes, std::io::Error>> = vec![Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ))];
        let events: Vec<_> = event_stream_from_bytes(futures_util::stream::iter(items))
            .collect()
            .await;
        assert!(matches!(events[0], Err(GatewayError::Transport(_))));
    }
}
