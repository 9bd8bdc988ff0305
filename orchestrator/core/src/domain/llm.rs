//! Llm
//!
//! Domain interface for model providers (Anti-Corruption Layer): the loop
//! never speaks a vendor's wire format directly. Extends the teacher's
//! single-shot `LLMProvider::generate` into a streaming `chat_stream` per
//! §6, keeping the same `LLMError` taxonomy and HTTP-status mapping.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements the Provider port (component boundary, §6).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::tool::ToolSchema;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
}

/// One incremental piece of a streamed model turn. `tool_call_delta`
/// arrives `index`-keyed: `id`/`name` populate only the first delta seen
/// for that index, `arguments_fragment` is appended incrementally and
/// folded by `StreamReducer` (T-StreamMachine).
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub text_delta: Option<String>,
    pub tool_call_delta: Option<ToolCallDelta>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_fragment: String,
}

/// One fully aggregated model turn (§3's `StreamResult`).
#[derive(Debug, Clone, Default)]
pub struct StreamResult {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub stop_reason: StopReason,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    Stop,
    ToolCalls,
    Length,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, LLMError>> + Send>>;

#[async_trait]
pub trait Provider: Send + Sync {
    fn default_model(&self) -> &str;

    async fn chat_stream(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolSchema],
    ) -> Result<ChunkStream, LLMError>;

    async fn health_check(&self) -> Result<(), LLMError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("rate limit exceeded")]
    RateLimit,
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Map an HTTP status code to the `LLMError` taxonomy all three adapters
/// share (kept verbatim from the teacher's single-shot adapters).
pub fn map_http_status(status: u16, model: &str, body: &str) -> LLMError {
    match status {
        401 | 403 => LLMError::Authentication(body.to_string()),
        429 => LLMError::RateLimit,
        404 => LLMError::ModelNotFound(model.to_string()),
        _ => LLMError::Provider(format!("HTTP {status}: {body}")),
    }
}
