use std::ops::Range;

use serde_json::Value;

use crate::json_scan::{object_candidates, widen_to_code_fence};
use crate::protocol::openai::{default_tool_type, ToolCallDescriptor, ToolCallFunction};
use crate::util::next_call_id;

const TOOL_CALLS_FIELD: &str = "tool_calls";

/// Recovers tool calls that the model wrote inline as text.
pub trait ToolExtractor: Send + Sync {
    /// Tool calls found in `text`, or `None` when there are none.
    fn extract(&self, text: &str) -> Option<Vec<ToolCallDescriptor>>;

    /// `text` with every tool-call block removed, trimmed.
    fn strip(&self, text: &str) -> String;
}

/// Finds `{"tool_calls": [...]}` JSON objects, bare or inside a code fence.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonToolExtractor;

struct ToolBlock {
    span: Range<usize>,
    calls: Vec<Value>,
}

fn find_tool_blocks(text: &str) -> Vec<ToolBlock> {
    if !text.contains(TOOL_CALLS_FIELD) {
        return Vec::new();
    }
    object_candidates(text)
        .into_iter()
        .filter_map(|range| {
            let slice = &text[range.clone()];
            if !slice.contains(TOOL_CALLS_FIELD) {
                return None;
            }
            let value: Value = serde_json::from_str(slice).ok()?;
            let Value::Object(mut object) = value else {
                return None;
            };
            let Some(Value::Array(calls)) = object.remove(TOOL_CALLS_FIELD) else {
                return None;
            };
            Some(ToolBlock {
                span: widen_to_code_fence(text, range),
                calls,
            })
        })
        .collect()
}

fn arguments_to_string(arguments: Option<&Value>) -> String {
    match arguments {
        None | Some(Value::Null) => "{}".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn descriptor_from_value(call: &Value, index: u32) -> Option<ToolCallDescriptor> {
    let function = call.get("function").unwrap_or(call);
    let name = function.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map_or_else(next_call_id, str::to_string);
    let type_ = call
        .get("type")
        .and_then(Value::as_str)
        .map_or_else(default_tool_type, str::to_string);
    Some(ToolCallDescriptor {
        index,
        id,
        type_,
        function: ToolCallFunction {
            name: name.to_string(),
            arguments: arguments_to_string(function.get("arguments")),
        },
    })
}

impl ToolExtractor for JsonToolExtractor {
    fn extract(&self, text: &str) -> Option<Vec<ToolCallDescriptor>> {
        let mut out = Vec::new();
        for block in find_tool_blocks(text) {
            for call in &block.calls {
                let index = u32::try_from(out.len()).unwrap_or(u32::MAX);
                if let Some(descriptor) = descriptor_from_value(call, index) {
                    out.push(descriptor);
                }
            }
        }
        (!out.is_empty()).then_some(out)
    }

    fn strip(&self, text: &str) -> String {
        let blocks = find_tool_blocks(text);
        if blocks.is_empty() {
            return text.trim().to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for block in blocks {
            // Blocks sharing one fence overlap at that fence.
            if block.span.end <= cursor {
                continue;
            }
            out.push_str(&text[cursor..block.span.start.max(cursor)]);
            cursor = block.span.end;
        }
        out.push_str(&text[cursor..]);
        out.trim().to_string()
    }
}
