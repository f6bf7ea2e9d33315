use std::fmt;

use crate::transport::TransportFailureKind;

/// Status recorded when the client went away before the response ended.
pub const CLIENT_CLOSED_STATUS: u16 = 499;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Completed,
    /// The upstream sent an error event mid-stream.
    UpstreamError,
    /// Reading or validating the event stream failed.
    StreamError,
    Transport(TransportFailureKind),
    /// The upstream answered with a non-2xx status.
    Rejected,
    Disconnected,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Completed => f.write_str("completed"),
            OutcomeKind::UpstreamError => f.write_str("upstream_error"),
            OutcomeKind::StreamError => f.write_str("stream_error"),
            OutcomeKind::Transport(kind) => write!(f, "transport_{kind}"),
            OutcomeKind::Rejected => f.write_str("rejected"),
            OutcomeKind::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Terminal result of one translated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    pub kind: OutcomeKind,
    pub http_status: u16,
    pub success: bool,
}

impl RequestOutcome {
    #[must_use]
    pub fn completed() -> Self {
        Self::new(OutcomeKind::Completed, 200, true)
    }

    #[must_use]
    pub fn upstream_error() -> Self {
        Self::new(OutcomeKind::UpstreamError, 200, false)
    }

    #[must_use]
    pub fn stream_error(http_status: u16) -> Self {
        Self::new(OutcomeKind::StreamError, http_status, false)
    }

    #[must_use]
    pub fn transport(kind: TransportFailureKind) -> Self {
        Self::new(OutcomeKind::Transport(kind), kind.http_status().as_u16(), false)
    }

    #[must_use]
    pub fn rejected() -> Self {
        Self::new(OutcomeKind::Rejected, 502, false)
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self::new(OutcomeKind::Disconnected, CLIENT_CLOSED_STATUS, false)
    }

    fn new(kind: OutcomeKind, http_status: u16, success: bool) -> Self {
        Self {
            kind,
            http_status,
            success,
        }
    }
}

type OutcomeCallback = Box<dyn FnOnce(RequestOutcome) + Send>;

/// Delivers exactly one [`RequestOutcome`] to the caller.
///
/// Only the first report is delivered. A reporter dropped without reporting
/// delivers [`RequestOutcome::disconnected`], which is how a client that
/// hangs up mid-response becomes observable.
pub struct OutcomeReporter {
    callback: Option<OutcomeCallback>,
}

impl OutcomeReporter {
    pub fn new(callback: impl FnOnce(RequestOutcome) + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    #[must_use]
    pub fn noop() -> Self {
        Self { callback: None }
    }

    pub fn report(&mut self, outcome: RequestOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }

    #[must_use]
    pub fn is_reported(&self) -> bool {
        self.callback.is_none()
    }
}

impl Drop for OutcomeReporter {
    fn drop(&mut self) {
        self.report(RequestOutcome::disconnected());
    }
}

impl fmt::Debug for OutcomeReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeReporter")
            .field("reported", &self.is_reported())
            .finish()
    }
}
