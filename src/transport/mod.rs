mod event_source;
mod http_transport;

pub use event_source::{call_upstream, event_stream_from_bytes, open, EventStream, UpstreamFailure};
pub use http_transport::{HttpTransport, TransportFailure, TransportFailureKind};
