//! Prompt-based function calling for an upstream without native tools.
//!
//! Tools are described to the model in a system prompt; tool calls come back
//! as inline JSON which the extractor recovers at the end of the reply.

pub mod extract;
pub mod inject;

pub use extract::{JsonToolExtractor, ToolExtractor};
pub use inject::{build_upstream_messages, render_tool_prompt};

use crate::config::FeaturesConfig;
use crate::protocol::openai::OpenAiChatRequest;

/// Whether tool handling applies to this request.
#[must_use]
pub fn tool_support_active(features: &FeaturesConfig, request: &OpenAiChatRequest) -> bool {
    features.tool_support && request.declares_tools()
}
