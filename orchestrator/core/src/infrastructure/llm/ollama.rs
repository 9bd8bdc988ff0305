// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Ollama adapter — Anti-Corruption Layer for local models via `/api/chat`.
//! Supports air-gapped deployments. Ollama's wire format streams
//! newline-delimited JSON objects rather than SSE, and emits each tool call
//! whole (no incremental `arguments` fragments) — both deltas still land on
//! the shared `Chunk`/`ToolCallDelta` shape so the reducer doesn't need an
//! Ollama-specific code path.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::llm::{Chunk, ChunkStream, FinishReason, LLMError, Provider, TokenUsage, ToolCallDelta};
use crate::domain::message::{ContentBlock, Message, Role};
use crate::domain::tool::ToolSchema;

pub struct OllamaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaAdapter {
    pub fn new(endpoint: String, model: String) -> Self {
        Self { client: reqwest::Client::new(), endpoint, model }
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
                json!({ "role": role, "content": m.text() })
            })
            .collect()
    }

    fn to_wire_tools(tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": { "name": t.name, "description": t.description, "parameters": t.input_schema }
                })
            })
            .collect()
    }
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct OllamaChatLine {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

#[derive(Deserialize, Default)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Deserialize)]
struct OllamaFunctionCall {
    name: String,
    arguments: serde_json::Value,
}

#[async_trait]
impl Provider for OllamaAdapter {
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

        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(if status == 404 {
                LLMError::ModelNotFound(self.model.clone())
            } else {
                LLMError::Provider(format!("HTTP {status}: {error_text}"))
            });
        }

        let stream = try_stream! {
            let mut buf = String::new();
            let mut bytes = response.bytes_stream();
            let mut next_index = 0usize;
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| LLMError::Network(e.to_string()))?;
                buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim().to_string();
                    buf.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }
                    let parsed: OllamaChatLine = serde_json::from_str(&line)
                        .map_err(|e| LLMError::Provider(format!("malformed ndjson line: {e}")))?;

                    if !parsed.message.content.is_empty() {
                        yield Chunk { text_delta: Some(parsed.message.content), ..Default::default() };
                    }
                    for call in parsed.message.tool_calls {
                        yield Chunk {
                            tool_call_delta: Some(ToolCallDelta {
                                index: next_index,
                                id: Some(format!("ollama-call-{next_index}")),
                                name: Some(call.function.name),
                                arguments_fragment: call.function.arguments.to_string(),
                            }),
                            ..Default::default()
                        };
                        next_index += 1;
                    }
                    if parsed.done {
                        yield Chunk {
                            finish_reason: Some(if next_index > 0 { FinishReason::ToolCalls } else { FinishReason::Stop }),
                            usage: Some(TokenUsage {
                                prompt_tokens: parsed.prompt_eval_count.unwrap_or(0),
                                completion_tokens: parsed.eval_count.unwrap_or(0),
                                total_tokens: parsed.prompt_eval_count.unwrap_or(0) + parsed.eval_count.unwrap_or(0),
                            }),
                            ..Default::default()
                        };
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let url = format!("{}/api/tags", self.endpoint.trim_end_matches('/'));
        let response = self.client.get(&url).send().await.map_err(|e| LLMError::Network(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
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
        let adapter = OllamaAdapter::new("http://localhost:11434".to_string(), "llama3".to_string());
        assert_eq!(adapter.default_model(), "llama3");
    }

    #[test]
    fn chat_line_with_tool_call_deserializes() {
        let json = serde_json::json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{ "function": { "name": "read_file", "arguments": { "path": "a.rs" } } }]
            },
            "done": true,
            "eval_count": 12,
            "prompt_eval_count": 30
        });
        let parsed: OllamaChatLine = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.message.tool_calls.len(), 1);
        assert_eq!(parsed.message.tool_calls[0].function.name, "read_file");
        assert!(parsed.done);
    }

    #[test]
    fn options_omit_temperature_when_unset() {
        let options = OllamaOptions { temperature: None };
        let json = serde_json::to_value(&options).unwrap();
        assert!(!json.as_object().unwrap().contains_key("temperature"));
    }
}
