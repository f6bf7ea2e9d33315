//! Per-event routing shared by the streaming and aggregating translators.

use crate::config::ThinkingMode;
use crate::fc::ToolExtractor;
use crate::protocol::openai::ToolCallDescriptor;
use crate::protocol::upstream::{edit_content_tail, Phase, UpstreamError, UpstreamEvent};

use super::thinking::transform_thinking;

/// A piece of output produced by one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Content(String),
    Reasoning(String),
}

impl Piece {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Piece::Content(text) | Piece::Reasoning(text) => text,
        }
    }
}

/// What the caller should do after routing an event.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteStep {
    Continue,
    Complete,
    /// The event carried an error; the first one found by priority.
    Failed(UpstreamError),
}

/// Result of finalizing a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Finalization {
    ToolCalls(Vec<ToolCallDescriptor>),
    /// Remaining text to flush, if any.
    Content(Option<String>),
}

#[derive(Debug)]
pub struct EventRouter {
    tools_active: bool,
    thinking_mode: ThinkingMode,
    sent_initial_answer: bool,
    buffer: String,
}

impl EventRouter {
    #[must_use]
    pub fn new(tools_active: bool, thinking_mode: ThinkingMode) -> Self {
        Self {
            tools_active,
            thinking_mode,
            sent_initial_answer: false,
            buffer: String::new(),
        }
    }

    #[must_use]
    pub fn tools_active(&self) -> bool {
        self.tools_active
    }

    /// Route one event, appending any output pieces to `out`.
    ///
    /// With tools active, text is only buffered. Otherwise the first
    /// answer-phase `edit_content` contributes its tail after the closing
    /// marker, and non-empty deltas become content or reasoning pieces.
    pub fn route(&mut self, event: &UpstreamEvent, out: &mut Vec<Piece>) -> RouteStep {
        if let Some(error) = event.error() {
            return RouteStep::Failed(error.clone());
        }

        let phase = event.phase();
        let text = event.text();
        if !text.is_empty() {
            let processed = if phase == Phase::Thinking {
                transform_thinking(text, self.thinking_mode)
            } else {
                text.to_string()
            };

            if self.tools_active {
                self.buffer.push_str(&processed);
            } else {
                let data = &event.data;
                if !self.sent_initial_answer && phase == Phase::Answer && !data.edit_content.is_empty() {
                    let tail = edit_content_tail(&data.edit_content);
                    if !tail.is_empty() {
                        out.push(Piece::Content(tail.to_string()));
                        self.sent_initial_answer = true;
                    }
                }
                if !data.delta_content.is_empty() && !processed.is_empty() {
                    out.push(if phase == Phase::Thinking {
                        Piece::Reasoning(processed)
                    } else {
                        Piece::Content(processed)
                    });
                }
            }
        }

        if event.is_completion() {
            RouteStep::Complete
        } else {
            RouteStep::Continue
        }
    }

    /// Decide the end of the reply. Only meaningful with tools active;
    /// otherwise everything was already emitted.
    pub fn finalize(&mut self, extractor: &dyn ToolExtractor) -> Finalization {
        if !self.tools_active {
            return Finalization::Content(None);
        }
        let buffer = std::mem::take(&mut self.buffer);
        if let Some(calls) = extractor.extract(&buffer) {
            return Finalization::ToolCalls(calls);
        }
        let stripped = extractor.strip(&buffer);
        if !stripped.is_empty() {
            Finalization::Content(Some(stripped))
        } else if !buffer.is_empty() {
            Finalization::Content(Some(buffer))
        } else {
            Finalization::Content(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fc::JsonToolExtractor;
    use serde_json::json;

    fn event(value: serde_json::Value) -> UpstreamEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_delta_routed_by_phase() {
        let mut router = EventRouter::new(false, ThinkingMode::Think);
        let mut out = Vec::new();
        router.route(
            &event(json!({"data": {"phase": "thinking", "delta_content": "> hmm"}})),
            &mut out,
        );
        router.route(
            &event(json!({"data": {"phase": "answer", "delta_content": "Hi"}})),
            &mut out,
        );
        assert_eq!(
            out,
            vec![Piece::Reasoning("hmm".into()), Piece::Content("Hi".into())]
        );
    }

    #[test]
    fn test_initial_edit_content_emitted_once() {
        let mut router = EventRouter::new(false, ThinkingMode::Think);
        let mut out = Vec::new();
        let edit = event(json!({"data": {
            "phase": "answer",
            "edit_content": "<details>thought</details>\nHello"
        }}));
        router.route(&edit, &mut out);
        router.route(&edit, &mut out);
        assert_eq!(out, vec![Piece::Content("\nHello".into())]);
    }

    #[test]
    fn test_edit_without_marker_does_not_latch() {
        let mut router = EventRouter::new(false, ThinkingMode::Think);
        let mut out = Vec::new();
        router.route(
            &event(json!({"data": {"phase": "answer", "edit_content": "no marker"}})),
            &mut out,
        );
        router.route(
            &event(json!({"data": {"phase": "answer", "edit_content": "a</details>b"}})),
            &mut out,
        );
        assert_eq!(out, vec![Piece::Content("b".into())]);
    }

    #[test]
    fn test_thinking_edit_content_not_emitted() {
        let mut router = EventRouter::new(false, ThinkingMode::Think);
        let mut out = Vec::new();
        let step = router.route(
            &event(json!({"data": {"phase": "thinking", "edit_content": "x</details>y"}})),
            &mut out,
        );
        assert_eq!(step, RouteStep::Continue);
        assert!(out.is_empty());
    }

    #[test]
    fn test_error_short_circuits() {
        let mut router = EventRouter::new(false, ThinkingMode::Think);
        let mut out = Vec::new();
        let step = router.route(
            &event(json!({"data": {"delta_content": "x", "error": {"detail": "quota"}}})),
            &mut out,
        );
        assert!(matches!(step, RouteStep::Failed(ref e) if e.detail.as_deref() == Some("quota")));
        assert!(out.is_empty());
    }

    #[test]
    fn test_completion_after_content() {
        let mut router = EventRouter::new(false, ThinkingMode::Think);
        let mut out = Vec::new();
        let step = router.route(
            &event(json!({"data": {"phase": "answer", "delta_content": "Hi", "done": true}})),
            &mut out,
        );
        assert_eq!(step, RouteStep::Complete);
        assert_eq!(out, vec![Piece::Content("Hi".into())]);
    }

    #[test]
    fn test_tools_active_buffers_and_extracts() {
        let mut router = EventRouter::new(true, ThinkingMode::Think);
        let mut out = Vec::new();
        router.route(
            &event(json!({"data": {"phase": "answer", "delta_content": "{\"tool_calls\":[{\"id\":\"c1\","}})),
            &mut out,
        );
        router.route(
            &event(json!({"data": {"phase": "answer", "delta_content": "\"function\":{\"name\":\"f\",\"arguments\":\"{}\"}}]}"}})),
            &mut out,
        );
        assert!(out.is_empty());
        match router.finalize(&JsonToolExtractor) {
            Finalization::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "c1");
            }
            other => panic!("unexpected finalization: {other:?}"),
        }
    }

    #[test]
    fn test_tools_active_falls_back_to_text() {
        let mut router = EventRouter::new(true, ThinkingMode::Think);
        let mut out = Vec::new();
        router.route(
            &event(json!({"data": {"phase": "answer", "delta_content": "  plain  "}})),
            &mut out,
        );
        assert_eq!(
            router.finalize(&JsonToolExtractor),
            Finalization::Content(Some("plain".into()))
        );

        let mut empty = EventRouter::new(true, ThinkingMode::Think);
        assert_eq!(empty.finalize(&JsonToolExtractor), Finalization::Content(None));
    }
}
