//! Wire types for the upstream chat service.
//!
//! Requests are always sent with `stream: true`; the reply is an event stream
//! whose `data:` payloads deserialize into [`UpstreamEvent`].

use serde::{Deserialize, Serialize};

/// Marker that closes the header/thinking block repeated in `edit_content`.
pub const EDIT_CONTENT_MARKER: &str = "</details>";

// ---------------------------------------------------------------------------
// Outbound request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UpstreamFeatures {
    pub enable_thinking: bool,
    pub web_search: bool,
    pub auto_web_search: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BackgroundTasks {
    pub title_generation: bool,
    pub tags_generation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelItem {
    pub id: String,
    pub name: String,
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRequest {
    pub stream: bool,
    pub chat_id: String,
    pub id: String,
    pub model: String,
    pub messages: Vec<UpstreamMessage>,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub features: UpstreamFeatures,
    pub background_tasks: BackgroundTasks,
    pub mcp_servers: Vec<String>,
    pub model_item: ModelItem,
    pub tool_servers: Vec<String>,
    pub variables: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// Content stage of an upstream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Thinking,
    Answer,
    Done,
    #[default]
    #[serde(other)]
    Other,
}

/// Error object embedded in an event payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamError {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamInner {
    #[serde(default)]
    pub error: Option<UpstreamError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamEventData {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub delta_content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub edit_content: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<UpstreamError>,
    #[serde(default)]
    pub inner: Option<UpstreamInner>,
}

/// One parsed upstream protocol event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: UpstreamEventData,
    #[serde(default)]
    pub error: Option<UpstreamError>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl UpstreamEvent {
    /// Return the embedded error, checking top-level, then `data`, then
    /// `data.inner`. The first one present wins.
    #[must_use]
    pub fn error(&self) -> Option<&UpstreamError> {
        self.error
            .as_ref()
            .or(self.data.error.as_ref())
            .or_else(|| self.data.inner.as_ref().and_then(|inner| inner.error.as_ref()))
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.data.phase
    }

    /// Delta text when present, otherwise the edit text.
    #[must_use]
    pub fn text(&self) -> &str {
        if self.data.delta_content.is_empty() {
            &self.data.edit_content
        } else {
            &self.data.delta_content
        }
    }

    /// Whether this event signals the end of generation.
    #[must_use]
    pub fn is_completion(&self) -> bool {
        self.data.done || self.data.phase == Phase::Done
    }
}

/// Genuine new content carried by an answer-phase `edit_content`: the text
/// after the first closing marker.
#[must_use]
pub fn edit_content_tail(edit_content: &str) -> &str {
    edit_content
        .split_once(EDIT_CONTENT_MARKER)
        .map_or("", |(_, tail)| tail)
}
