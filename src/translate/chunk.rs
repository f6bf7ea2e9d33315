use bytes::Bytes;

use crate::protocol::openai::{
    OpenAiChatResponse, OpenAiChoice, OpenAiDelta, OpenAiResponseMessage, OpenAiStreamChoice,
    OpenAiStreamChunk, OpenAiUsage, ToolCallDescriptor, CHUNK_OBJECT, COMPLETION_OBJECT,
};
use crate::stream::json_sse_frame;

pub const FINISH_STOP: &str = "stop";
pub const FINISH_TOOL_CALLS: &str = "tool_calls";

/// Builds output chunks that share one id, timestamp and model name.
#[derive(Debug, Clone)]
pub struct ChunkFactory {
    id: String,
    created: u64,
    model: String,
}

impl ChunkFactory {
    #[must_use]
    pub fn new(id: String, created: u64, model: String) -> Self {
        Self { id, created, model }
    }

    #[must_use]
    pub fn chunk(&self, delta: OpenAiDelta, finish_reason: Option<&str>) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: self.id.clone(),
            object: CHUNK_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    fn frame(&self, delta: OpenAiDelta, finish_reason: Option<&str>) -> Bytes {
        json_sse_frame(&self.chunk(delta, finish_reason))
    }

    #[must_use]
    pub fn role_frame(&self) -> Bytes {
        self.frame(
            OpenAiDelta {
                role: Some("assistant".to_string()),
                ..OpenAiDelta::default()
            },
            None,
        )
    }

    #[must_use]
    pub fn content_frame(&self, text: String) -> Bytes {
        self.frame(
            OpenAiDelta {
                content: Some(text),
                ..OpenAiDelta::default()
            },
            None,
        )
    }

    #[must_use]
    pub fn reasoning_frame(&self, text: String) -> Bytes {
        self.frame(
            OpenAiDelta {
                reasoning_content: Some(text),
                ..OpenAiDelta::default()
            },
            None,
        )
    }

    #[must_use]
    pub fn tool_call_frame(&self, call: ToolCallDescriptor) -> Bytes {
        self.frame(
            OpenAiDelta {
                tool_calls: Some(vec![call]),
                ..OpenAiDelta::default()
            },
            None,
        )
    }

    #[must_use]
    pub fn finish_frame(&self, finish_reason: &str) -> Bytes {
        self.frame(OpenAiDelta::default(), Some(finish_reason))
    }

    /// The complete non-streaming response. Usage is always zero.
    #[must_use]
    pub fn completion(
        &self,
        content: Option<String>,
        tool_calls: Option<Vec<ToolCallDescriptor>>,
    ) -> OpenAiChatResponse {
        let finish_reason = if tool_calls.is_some() {
            FINISH_TOOL_CALLS
        } else {
            FINISH_STOP
        };
        OpenAiChatResponse {
            id: self.id.clone(),
            object: COMPLETION_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiResponseMessage {
                    role: "assistant".to_string(),
                    content,
                    tool_calls,
                },
                finish_reason: finish_reason.to_string(),
            }],
            usage: OpenAiUsage::default(),
        }
    }
}
