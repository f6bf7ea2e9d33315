use std::fmt::Write as _;

use crate::protocol::openai::{
    content_to_text, OpenAiChatRequest, OpenAiMessage, OpenAiTool, OpenAiToolCall,
    OpenAiToolChoice,
};
use crate::protocol::upstream::UpstreamMessage;

fn render_tool_list(tools: &[OpenAiTool]) -> String {
    let mut out = String::new();
    for tool in tools {
        let function = &tool.function;
        let _ = write!(out, "- {}", function.name);
        if let Some(description) = function.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, ": {description}");
        }
        out.push('\n');
        if let Some(parameters) = &function.parameters {
            let _ = writeln!(out, "  parameters: {parameters}");
        }
    }
    out
}

fn render_choice_rule(tool_choice: Option<&OpenAiToolChoice>) -> Option<String> {
    match tool_choice? {
        OpenAiToolChoice::Mode(mode) if mode == "required" => {
            Some("You must call at least one tool in this reply.".to_string())
        }
        OpenAiToolChoice::Function(selected) => Some(format!(
            "You must call the tool `{}` in this reply.",
            selected.function.name
        )),
        OpenAiToolChoice::Mode(_) => None,
    }
}

/// System prompt describing the tools and the reply format the extractor expects.
#[must_use]
pub fn render_tool_prompt(tools: &[OpenAiTool], tool_choice: Option<&OpenAiToolChoice>) -> String {
    let mut prompt = String::from("You can call the following tools:\n\n");
    prompt.push_str(&render_tool_list(tools));
    prompt.push_str(
        "\nTo call tools, reply with exactly one fenced JSON block of this shape and nothing after it:\n\
```json\n\
{\"tool_calls\":[{\"id\":\"call_<unique id>\",\"type\":\"function\",\"function\":{\"name\":\"<tool name>\",\"arguments\":\"<JSON-encoded arguments>\"}}]}\n\
```\n\
If no tool is needed, answer normally without the block.",
    );
    if let Some(rule) = render_choice_rule(tool_choice) {
        prompt.push('\n');
        prompt.push_str(&rule);
    }
    prompt
}

fn render_prior_tool_calls(calls: &[OpenAiToolCall]) -> String {
    let rendered: Vec<serde_json::Value> = calls
        .iter()
        .map(|call| {
            serde_json::json!({
                "id": call.id,
                "type": call.type_,
                "function": {
                    "name": call.function.name,
                    "arguments": call.function.arguments,
                }
            })
        })
        .collect();
    let block = serde_json::json!({ "tool_calls": rendered });
    format!("```json\n{block}\n```")
}

fn plain_message(message: &OpenAiMessage) -> UpstreamMessage {
    UpstreamMessage {
        role: message.role.clone(),
        content: content_to_text(message.content.as_ref()),
        reasoning_content: message.reasoning_content.clone(),
    }
}

fn rewrite_for_tools(message: &OpenAiMessage) -> UpstreamMessage {
    match message.role.as_str() {
        "tool" => {
            let call_id = message.tool_call_id.as_deref().unwrap_or("unknown");
            UpstreamMessage {
                role: "user".to_string(),
                content: format!(
                    "Tool result for call {call_id}:\n{}",
                    content_to_text(message.content.as_ref())
                ),
                reasoning_content: None,
            }
        }
        "assistant" => {
            let mut out = plain_message(message);
            if let Some(calls) = message.tool_calls.as_deref().filter(|c| !c.is_empty()) {
                if !out.content.is_empty() {
                    out.content.push('\n');
                }
                out.content.push_str(&render_prior_tool_calls(calls));
            }
            out
        }
        _ => plain_message(message),
    }
}

/// Convert the client's messages into the upstream message list.
///
/// With tools active the tool prompt is merged into the leading system
/// message (or inserted as one), earlier assistant tool calls are rendered
/// as JSON text and `tool` messages become user messages.
#[must_use]
pub fn build_upstream_messages(request: &OpenAiChatRequest, tools_active: bool) -> Vec<UpstreamMessage> {
    if !tools_active {
        return request.messages.iter().map(plain_message).collect();
    }

    let mut messages: Vec<UpstreamMessage> =
        request.messages.iter().map(rewrite_for_tools).collect();
    let prompt = render_tool_prompt(
        request.tools.as_deref().unwrap_or_default(),
        request.tool_choice.as_ref(),
    );
    match messages.first_mut() {
        Some(first) if first.role == "system" => {
            if !first.content.is_empty() {
                first.content.push_str("\n\n");
            }
            first.content.push_str(&prompt);
        }
        _ => messages.insert(
            0,
            UpstreamMessage {
                role: "system".to_string(),
                content: prompt,
                reasoning_content: None,
            },
        ),
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> OpenAiChatRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plain_messages_pass_through() {
        let req = request(json!({
            "model": "GLM-4.5",
            "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}]
        }));
        let messages = build_upstream_messages(&req, false);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hi");
    }

    #[test]
    fn test_tool_prompt_inserted_as_system_message() {
        let req = request(json!({
            "model": "GLM-4.5",
            "messages": [{"role": "user", "content": "weather?"}],
            "tools": [{"type": "function", "function": {
                "name": "get_weather", "description": "Look up weather",
                "parameters": {"type": "object"}
            }}]
        }));
        let messages = build_upstream_messages(&req, true);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("- get_weather: Look up weather"));
        assert!(messages[0].content.contains("\"tool_calls\""));
    }

    #[test]
    fn test_tool_prompt_merged_into_existing_system() {
        let req = request(json!({
            "model": "GLM-4.5",
            "messages": [{"role": "system", "content": "Be brief."}, {"role": "user", "content": "x"}],
            "tools": [{"type": "function", "function": {"name": "f"}}],
            "tool_choice": {"type": "function", "function": {"name": "f"}}
        }));
        let messages = build_upstream_messages(&req, true);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("Be brief.\n\n"));
        assert!(messages[0].content.ends_with("You must call the tool `f` in this reply."));
    }

    #[test]
    fn test_tool_history_is_rewritten() {
        let req = request(json!({
            "model": "GLM-4.5",
            "messages": [
                {"role": "user", "content": "weather?"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}}
                ]},
                {"role": "tool", "tool_call_id": "call_1", "content": "sunny"}
            ],
            "tools": [{"type": "function", "function": {"name": "get_weather"}}]
        }));
        let messages = build_upstream_messages(&req, true);
        assert_eq!(messages.len(), 4);
        assert!(messages[2].content.starts_with("```json\n{\"tool_calls\""));
        assert!(messages[2].content.contains("call_1"));
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "Tool result for call call_1:\nsunny");
    }
}
