use serde::{Deserialize, Serialize};

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const COMPLETION_OBJECT: &str = "chat.completion";

/// `OpenAI` Chat Completion request wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChatRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<OpenAiToolChoice>,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OpenAiChatRequest {
    /// Whether the caller declared tools and did not switch invocation off.
    #[must_use]
    pub fn declares_tools(&self) -> bool {
        let has_tools = self.tools.as_ref().is_some_and(|tools| !tools.is_empty());
        has_tools && !matches!(&self.tool_choice, Some(OpenAiToolChoice::Mode(mode)) if mode == "none")
    }
}

/// `tool_choice` field in `OpenAI` Chat requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAiToolChoice {
    Mode(String),
    Function(OpenAiToolChoiceFunctionCall),
}

/// `tool_choice` object form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolChoiceFunctionCall {
    #[serde(rename = "type")]
    pub type_: String,
    pub function: OpenAiToolChoiceFunction,
}

/// Nested function selector in `tool_choice`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolChoiceFunction {
    pub name: String,
}

/// `OpenAI` message wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A tool call within a request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_tool_type")]
    pub type_: String,
    pub function: ToolCallFunction,
}

/// A tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiTool {
    #[serde(rename = "type", default = "default_tool_type")]
    pub type_: String,
    pub function: OpenAiToolFunction,
}

/// A function declaration within a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

pub(crate) fn default_tool_type() -> String {
    "function".to_string()
}

/// A tool call recovered from model text, in the shape clients receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDescriptor {
    pub index: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub function: ToolCallFunction,
}

/// The function part of a tool call; `arguments` is JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// Usage info in the response. The upstream reports none, so it stays zeroed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OpenAiUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A streaming chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiStreamChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<OpenAiStreamChoice>,
}

/// A choice within a stream chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiStreamChoice {
    pub index: u32,
    pub delta: OpenAiDelta,
    pub finish_reason: Option<String>,
}

/// Delta content within a stream choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDescriptor>>,
}

/// `OpenAI` Chat Completion (non-streaming) response wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChatResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<OpenAiChoice>,
    pub usage: OpenAiUsage,
}

/// A single choice in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChoice {
    pub index: u32,
    pub message: OpenAiResponseMessage,
    pub finish_reason: String,
}

/// Assistant message in a non-streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiResponseMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDescriptor>>,
}

/// Flatten `OpenAI` message content (string or array of parts) into plain text.
#[must_use]
pub fn content_to_text(content: Option<&serde_json::Value>) -> String {
    match content {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Array(parts)) => {
            let mut out = String::new();
            for part in parts {
                let text = part
                    .get("text")
                    .and_then(serde_json::Value::as_str)
                    .or_else(|| part.as_str());
                if let Some(text) = text {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
            }
            out
        }
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> OpenAiChatRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_declares_tools_requires_non_empty_list() {
        let req = request(json!({"model": "m", "messages": [], "tools": []}));
        assert!(!req.declares_tools());
        let req = request(json!({
            "model": "m",
            "messages": [],
            "tools": [{"type": "function", "function": {"name": "f"}}]
        }));
        assert!(req.declares_tools());
    }

    #[test]
    fn test_declares_tools_respects_tool_choice_none() {
        let req = request(json!({
            "model": "m",
            "messages": [],
            "tools": [{"type": "function", "function": {"name": "f"}}],
            "tool_choice": "none"
        }));
        assert!(!req.declares_tools());
    }

    #[test]
    fn test_stream_defaults_to_false() {
        let req = request(json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]}));
        assert!(!req.stream);
    }

    #[test]
    fn test_content_to_text_flattens_parts() {
        let content = json!([
            {"type": "text", "text": "first"},
            {"type": "image_url", "image_url": {"url": "http://x"}},
            {"type": "text", "text": "second"}
        ]);
        assert_eq!(content_to_text(Some(&content)), "first\nsecond");
        assert_eq!(content_to_text(None), "");
    }

    #[test]
    fn test_delta_omits_empty_fields() {
        let delta = OpenAiDelta {
            content: Some("Hi".into()),
            ..OpenAiDelta::default()
        };
        assert_eq!(serde_json::to_string(&delta).unwrap(), r#"{"content":"Hi"}"#);
    }
}
