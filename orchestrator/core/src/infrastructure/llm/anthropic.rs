// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Anthropic Claude Messages API adapter, streaming flavor. Anti-Corruption
//! Layer translating domain `Message`/`ToolSchema` into the `messages`
//! wire format with `stream: true`, folding Anthropic's
//! `content_block_delta`/`message_delta` SSE events into domain `Chunk`s.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use crate::domain::llm::{map_http_status, Chunk, ChunkStream, FinishReason, LLMError, Provider, TokenUsage, ToolCallDelta};
use crate::domain::message::{ContentBlock, Message, Role};
use crate::domain::tool::ToolSchema;

use super::sse::sse_events;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: String, model: String) -> Self {
        Self { client: reqwest::Client::new(), api_key, model }
    }

    fn to_wire_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::User { "user" } else { "assistant" };
                let blocks: Vec<serde_json::Value> = m
                    .content
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
                        ContentBlock::ToolUse { id, name, input } => {
                            json!({ "type": "tool_use", "id": id.to_string(), "name": name, "input": input })
                        }
                        ContentBlock::ToolResult { tool_use_id, content, is_error } => json!({
                            "type": "tool_result",
                            "tool_use_id": tool_use_id.to_string(),
                            "content": content,
                            "is_error": is_error,
                        }),
                        ContentBlock::Image { media_type, data } => json!({
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": format!("image/{:?}", media_type).to_lowercase(),
                                "data": data,
                            }
                        }),
                    })
                    .collect();
                json!({ "role": role, "content": blocks })
            })
            .collect()
    }

    fn to_wire_tools(tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.input_schema }))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum AnthropicEvent {
    #[serde(rename = "content_block_start")]
    ContentBlockStart { index: usize, content_block: ContentBlockStart },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: ContentDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: MessageDeltaInner, usage: Option<AnthropicUsage> },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlockStart {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentDelta {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(rename = "input_json_delta")]
    InputJson { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDeltaInner {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn finish_reason(raw: &str) -> FinishReason {
    match raw {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "tool_use" => FinishReason::ToolCalls,
        "max_tokens" => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl Provider for AnthropicAdapter {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolSchema],
    ) -> Result<ChunkStream, LLMError> {
        let mut body = json!({
            "model": self.model,
            "system": system_prompt,
            "messages": Self::to_wire_messages(messages),
            "max_tokens": 4096,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = json!(Self::to_wire_tools(tools));
        }

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status(status, &self.model, &body));
        }

        let stream = try_stream! {
            // tool_use block index -> synthetic delta index, so the reducer
            // sees a dense 0..N index space even though Anthropic's block
            // indices are interleaved with text blocks.
            let mut tool_indices: HashMap<usize, usize> = HashMap::new();
            let mut events = Box::pin(sse_events(response));
            while let Some(event) = events.next().await {
                let event = event?;
                let Ok(parsed) = serde_json::from_str::<AnthropicEvent>(&event) else { continue };
                match parsed {
                    AnthropicEvent::ContentBlockStart { index, content_block: ContentBlockStart::ToolUse { id, name } } => {
                        let synthetic = tool_indices.len();
                        tool_indices.insert(index, synthetic);
                        yield Chunk {
                            tool_call_delta: Some(ToolCallDelta {
                                index: synthetic,
                                id: Some(id),
                                name: Some(name),
                                arguments_fragment: String::new(),
                            }),
                            ..Default::default()
                        };
                    }
                    AnthropicEvent::ContentBlockDelta { index, delta: ContentDelta::Text { text } } => {
                        yield Chunk { text_delta: Some(text), ..Default::default() };
                        let _ = index;
                    }
                    AnthropicEvent::ContentBlockDelta { index, delta: ContentDelta::InputJson { partial_json } } => {
                        if let Some(&synthetic) = tool_indices.get(&index) {
                            yield Chunk {
                                tool_call_delta: Some(ToolCallDelta {
                                    index: synthetic,
                                    id: None,
                                    name: None,
                                    arguments_fragment: partial_json,
                                }),
                                ..Default::default()
                            };
                        }
                    }
                    AnthropicEvent::MessageDelta { delta, usage } => {
                        yield Chunk {
                            finish_reason: delta.stop_reason.as_deref().map(finish_reason),
                            usage: usage.map(|u| TokenUsage {
                                prompt_tokens: u.input_tokens,
                                completion_tokens: u.output_tokens,
                                total_tokens: u.input_tokens + u.output_tokens,
                            }),
                            ..Default::default()
                        };
                    }
                    _ => {}
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let response = self
            .client
            .get("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() || response.status() == 404 || response.status() == 405 {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(LLMError::Authentication("invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_exposes_configured_model() {
        let adapter = AnthropicAdapter::new("key".to_string(), "claude-sonnet-4".to_string());
        assert_eq!(adapter.default_model(), "claude-sonnet-4");
    }

    #[test]
    fn finish_reason_maps_tool_use_stop() {
        assert_eq!(finish_reason("tool_use"), FinishReason::ToolCalls);
        assert_eq!(finish_reason("end_turn"), FinishReason::Stop);
        assert_eq!(finish_reason("max_tokens"), FinishReason::Length);
    }

    #[test]
    fn content_block_start_parses_tool_use() {
        let json = serde_json::json!({
            "type": "content_block_start",
            "index": 1,
            "content_block": { "type": "tool_use", "id": "toolu_1", "name": "read_file" }
        });
        let event: AnthropicEvent = serde_json::from_value(json).unwrap();
        match event {
            AnthropicEvent::ContentBlockStart { index, content_block: ContentBlockStart::ToolUse { id, name } } => {
                assert_eq!(index, 1);
                assert_eq!(id, "toolu_1");
                assert_eq!(name, "read_file");
            }
            _ => panic!("expected tool_use content_block_start"),
        }
    }
}
