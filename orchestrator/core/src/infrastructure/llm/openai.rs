// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # OpenAI / Azure OpenAI Adapter
//!
//! Implements the `Provider` domain trait for OpenAI `gpt-*` models and
//! OpenAI-compatible APIs (LM Studio, vLLM, Azure OpenAI deployments). Acts
//! as an Anti-Corruption Layer: translates domain `Message`/`ToolSchema`
//! into the Chat Completions `stream: true` wire format and folds the SSE
//! byte stream into domain `Chunk`s.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::llm::{map_http_status, Chunk, ChunkStream, FinishReason, LLMError, Provider, ToolCallDelta};
use crate::domain::message::{ContentBlock, Message, Role};
use crate::domain::tool::ToolSchema;

use super::sse::sse_events;

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAIAdapter {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self { client: reqwest::Client::new(), endpoint, api_key, model }
    }

    fn to_wire_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                let text: String = m
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                json!({ "role": role, "content": text })
            })
            .collect()
    }

    fn to_wire_tools(tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<StreamToolCall>,
}

#[derive(Deserialize)]
struct StreamToolCall {
    index: usize,
    id: Option<String>,
    function: StreamFunctionDelta,
}

#[derive(Deserialize, Default)]
struct StreamFunctionDelta {
    name: Option<String>,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize, Serialize, Clone)]
struct StreamUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn finish_reason(raw: &str) -> FinishReason {
    match raw {
        "stop" => FinishReason::Stop,
        "tool_calls" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl Provider for OpenAIAdapter {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolSchema],
    ) -> Result<ChunkStream, LLMError> {
        let mut wire_messages = vec![json!({ "role": "system", "content": system_prompt })];
        wire_messages.extend(Self::to_wire_messages(messages));

        let mut body = json!({
            "model": self.model,
            "messages": wire_messages,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = json!(Self::to_wire_tools(tools));
        }

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status(status, &self.model, &body));
        }

        let model = self.model.clone();
        let stream = try_stream! {
            let mut events = Box::pin(sse_events(response));
            while let Some(event) = events.next().await {
                let event = event?;
                if event == "[DONE]" {
                    break;
                }
                let parsed: StreamChunk = serde_json::from_str(&event)
                    .map_err(|e| LLMError::Provider(format!("malformed stream chunk: {e}")))?;
                let Some(choice) = parsed.choices.into_iter().next() else { continue };

                if let Some(text) = choice.delta.content {
                    if !text.is_empty() {
                        yield Chunk { text_delta: Some(text), ..Default::default() };
                    }
                }
                for tc in choice.delta.tool_calls {
                    yield Chunk {
                        tool_call_delta: Some(ToolCallDelta {
                            index: tc.index,
                            id: tc.id,
                            name: tc.function.name,
                            arguments_fragment: tc.function.arguments,
                        }),
                        ..Default::default()
                    };
                }
                if let Some(reason) = choice.finish_reason {
                    yield Chunk {
                        finish_reason: Some(finish_reason(&reason)),
                        usage: parsed.usage.map(|u| crate::domain::llm::TokenUsage {
                            prompt_tokens: u.prompt_tokens,
                            completion_tokens: u.completion_tokens,
                            total_tokens: u.total_tokens,
                        }),
                        ..Default::default()
                    };
                }
            }
            let _ = &model;
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
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
    fn adapter_construction_retains_configured_model() {
        let adapter = OpenAIAdapter::new(
            "https://api.openai.com/v1".to_string(),
            "test-key".to_string(),
            "gpt-4o".to_string(),
        );
        assert_eq!(adapter.default_model(), "gpt-4o");
    }

    #[test]
    fn finish_reason_maps_tool_calls() {
        assert_eq!(finish_reason("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(finish_reason("length"), FinishReason::Length);
        assert_eq!(finish_reason("anything_else"), FinishReason::Stop);
    }

    #[test]
    fn stream_chunk_deserializes_tool_call_delta() {
        let json = serde_json::json!({
            "choices": [{
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_1",
                        "function": { "name": "read_file", "arguments": "{\"path\":" }
                    }]
                },
                "finish_reason": null
            }]
        });
        let parsed: StreamChunk = serde_json::from_value(json).unwrap();
        let tc = &parsed.choices[0].delta.tool_calls[0];
        assert_eq!(tc.id.as_deref(), Some("call_1"));
        assert_eq!(tc.function.name.as_deref(), Some("read_file"));
    }
}
