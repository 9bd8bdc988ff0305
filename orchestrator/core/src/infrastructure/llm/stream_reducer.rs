// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Folds a sequence of domain `Chunk`s into one `StreamResult`. Pure and
//! synchronous by design: the same chunk sequence always folds to the same
//! result regardless of how the upstream transport happened to split
//! `arguments_fragment` across network reads, which is what makes the
//! reducer unit-testable independent of any adapter.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::llm::{Chunk, StopReason, StreamResult, ToolCallRequest};

#[derive(Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

#[derive(Default)]
pub struct StreamReducer {
    text: String,
    calls: BTreeMap<usize, PendingCall>,
    stop_reason: StopReason,
    usage: Option<crate::domain::llm::TokenUsage>,
}

impl StreamReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, chunk: Chunk) {
        if let Some(text) = chunk.text_delta {
            self.text.push_str(&text);
        }
        if let Some(delta) = chunk.tool_call_delta {
            let entry = self.calls.entry(delta.index).or_default();
            if let Some(id) = delta.id {
                entry.id = Some(id);
            }
            if let Some(name) = delta.name {
                entry.name = Some(name);
            }
            entry.arguments.push_str(&delta.arguments_fragment);
        }
        if let Some(reason) = chunk.finish_reason {
            self.stop_reason = match reason {
                crate::domain::llm::FinishReason::ToolCalls => StopReason::ToolCalls,
                crate::domain::llm::FinishReason::Length => StopReason::Length,
                _ => StopReason::Stop,
            };
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
    }

    /// Consumes the reducer. Tool calls with unparseable JSON arguments are
    /// dropped rather than surfaced as a stream-level error — the agent
    /// loop reports the malformed call back to the model as a tool_result
    /// error instead, keeping a single failure path for "tool asked for
    /// something broken".
    pub fn finish(self) -> StreamResult {
        let tool_calls = self
            .calls
            .into_iter()
            .filter_map(|(_, call)| {
                let id = call.id?;
                let name = call.name?;
                let input: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
                Some(ToolCallRequest { id, name, input })
            })
            .collect();

        StreamResult { text: self.text, tool_calls, stop_reason: self.stop_reason, usage: self.usage }
    }
}
