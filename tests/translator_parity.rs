use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::{json, Value};
use zai_gateway::config::ThinkingMode;
use zai_gateway::error::GatewayError;
use zai_gateway::fc::JsonToolExtractor;
use zai_gateway::protocol::upstream::UpstreamEvent;
use zai_gateway::translate::{
    AggregatingTranslator, ChunkFactory, OutcomeReporter, ResponseContext, StreamingTranslator,
    Translator,
};
use zai_gateway::transport::EventStream;

fn ctx(tools_active: bool) -> ResponseContext {
    ResponseContext {
        chunks: ChunkFactory::new("chatcmpl-parity".into(), 1, "GLM-4.5".into()),
        tools_active,
        thinking_mode: ThinkingMode::Think,
        extractor: Arc::new(JsonToolExtractor),
    }
}

fn events(values: &[Value]) -> EventStream {
    let items: Vec<Result<UpstreamEvent, GatewayError>> = values
        .iter()
        .map(|value| Ok(serde_json::from_value(value.clone()).unwrap()))
        .collect();
    Box::pin(futures_util::stream::iter(items))
}

/// `content` and `reasoning_content` deltas joined in emission order.
async fn streamed_text(tools_active: bool, values: &[Value]) -> String {
    let frames: Vec<_> = StreamingTranslator::new(ctx(tools_active))
        .frames(Ok(events(values)), OutcomeReporter::noop())
        .collect()
        .await;
    let mut text = String::new();
    for frame in frames {
        let frame = std::str::from_utf8(&frame).unwrap().to_string();
        let body = frame.strip_prefix("data: ").unwrap().trim_end();
        if body == "[DONE]" {
            continue;
        }
        let chunk: Value = serde_json::from_str(body).unwrap();
        let delta = &chunk["choices"][0]["delta"];
        for field in ["reasoning_content", "content"] {
            if let Some(piece) = delta[field].as_str() {
                text.push_str(piece);
            }
        }
    }
    text
}

async fn aggregated_text(tools_active: bool, values: &[Value]) -> String {
    let response = AggregatingTranslator::new(ctx(tools_active))
        .translate(Ok(events(values)), OutcomeReporter::noop())
        .await;
    assert_eq!(response.status(), 200);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_aggregate_matches_streamed_text() {
    let values = vec![
        json!({"data": {"phase": "thinking", "delta_content": "<details type=\"reasoning\">\n> weigh"}}),
        json!({"data": {"phase": "thinking", "delta_content": " the options"}}),
        json!({"data": {"phase": "answer", "edit_content": "<details>\n> weigh the options\n</details>\nThe answer"}}),
        json!({"data": {"phase": "answer", "delta_content": " is"}}),
        json!({"data": {"phase": "answer", "delta_content": " 42."}}),
        json!({"data": {"phase": "done", "done": true}}),
    ];
    let streamed = streamed_text(false, &values).await;
    let aggregated = aggregated_text(false, &values).await;
    assert!(streamed.ends_with("The answer is 42."));
    assert!(streamed.contains("the options"));
    assert_eq!(aggregated, streamed);
}

#[tokio::test]
async fn test_aggregate_matches_streamed_text_with_tools_and_no_calls() {
    let values = vec![
        json!({"data": {"phase": "answer", "delta_content": "No tool needed.\n```\n{\"tool_calls\":[]}\n```\n"}}),
        json!({"data": {"phase": "answer", "delta_content": "{\"tool_calls\":[]}\n```"}}),
        json!({"data": {"phase": "done", "done": true}}),
    ];
    let streamed = streamed_text(true, &values).await;
    let aggregated = aggregated_text(true, &values).await;
    assert_eq!(streamed, "No tool needed.");
    assert_eq!(aggregated, streamed);
}
