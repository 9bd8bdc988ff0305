// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent loop (component G, §4.4): the turn/iteration state machine that
//! streams a model turn, dispatches its tool calls (parallel for
//! read-only tools, serial for the rest), and re-feeds results until the
//! model stops emitting tool calls or `max_iterations` is hit.
//!
//! Grounded on nothing in the teacher — its closest analogue was a
//! Temporal-specific retry loop with no reusable shape beyond "loop with
//! retries". This is new code, built directly from §4.4's eleven-step
//! algorithm and the T-Balance/T-Ordering testable properties.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::llm::{Provider, StopReason};
use crate::domain::message::{ContentBlock, Message, Role, ToolCallId};
use crate::domain::tool::ToolRegistry;
use crate::domain::io::Io;

use super::executor::Executor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model stopped emitting tool calls; control returns to the user.
    Completed,
    /// A tool result came back `user_cancelled=true`; the iteration (and
    /// the turn) was aborted early per §4.4 step 5.
    Cancelled,
    /// `max_iterations` (positive) was reached before the model stopped.
    MaxIterationsReached,
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    executor: Arc<Executor>,
    io: Arc<dyn Io>,
    system_prompt: String,
    /// `0` means unlimited (§9 Open Question resolution).
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        executor: Arc<Executor>,
        io: Arc<dyn Io>,
        system_prompt: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        Self { provider, registry, executor, io, system_prompt: system_prompt.into(), max_iterations }
    }

    /// Drives one user turn to completion. `transcript` is mutated
    /// in-place with every assistant/tool-result message appended, so the
    /// caller can persist or re-display it across turns.
    pub async fn run_turn(&self, transcript: &mut Vec<Message>, cancel_turn: CancellationToken) -> LoopOutcome {
        let mut iteration: u32 = 0;

        loop {
            iteration += 1;
            if self.max_iterations > 0 && iteration > self.max_iterations {
                self.io.system_message(&format!(
                    "[max_iterations={} reached; ending turn]",
                    self.max_iterations
                ));
                return LoopOutcome::MaxIterationsReached;
            }

            self.io.thinking_start();

            let schemas = self.registry.schemas();
            let stream = match self.provider.chat_stream(transcript, &self.system_prompt, &schemas).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.io.error(&format!("model request failed: {e}"));
                    return LoopOutcome::Completed;
                }
            };

            let stream_result = match self.consume_stream(stream, &cancel_turn).await {
                Some(result) => result,
                None => {
                    self.io.system_message("[cancelled]");
                    return LoopOutcome::Cancelled;
                }
            };

            if let Some(usage) = &stream_result.usage {
                self.io.set_tokens(usage.total_tokens);
            }

            let mut assistant_blocks = Vec::new();
            if !stream_result.text.is_empty() {
                assistant_blocks.push(ContentBlock::text(stream_result.text.clone()));
            }
            let mut ids_in_order = Vec::with_capacity(stream_result.tool_calls.len());
            for call in &stream_result.tool_calls {
                let id = ToolCallId::new();
                ids_in_order.push((id, call.name.clone(), call.input.clone()));
                assistant_blocks.push(ContentBlock::tool_use(id, call.name.clone(), call.input.clone()));
            }
            transcript.push(Message::assistant(assistant_blocks));

            if stream_result.tool_calls.is_empty() || stream_result.stop_reason != StopReason::ToolCalls {
                self.io.text_done(&stream_result.text);
                return LoopOutcome::Completed;
            }

            let (parallel, serial): (Vec<_>, Vec<_>) = ids_in_order
                .into_iter()
                .partition(|(_, name, _)| self.registry.get(name).map(|t| t.is_read_only()).unwrap_or(false));

            let mut results: HashMap<ToolCallId, crate::domain::tool::ToolResult> = HashMap::new();

            if !parallel.is_empty() {
                let mut set = JoinSet::new();
                for (id, name, input) in parallel {
                    self.io.tool_start(id, &name, &input);
                    let executor = self.executor.clone();
                    let cancel = cancel_turn.clone();
                    set.spawn(async move {
                        let result = executor.execute(&cancel, id, &name, input).await;
                        (id, name, result)
                    });
                }
                while let Some(joined) = set.join_next().await {
                    if let Ok((id, name, result)) = joined {
                        self.io.tool_done(id, &name, &result.content, result.is_error);
                        results.insert(id, result);
                    }
                }
            }

            for (id, name, input) in serial {
                self.io.tool_start(id, &name, &input);
                let result = self.executor.execute(&cancel_turn, id, &name, input).await;
                self.io.tool_done(id, &name, &result.content, result.is_error);
                results.insert(id, result);
            }

            // Reorder by original emission order (T-Ordering) regardless of
            // completion order above.
            let ordered_ids: Vec<ToolCallId> = transcript
                .last()
                .map(|msg| msg.tool_uses().map(|(id, _, _)| *id).collect())
                .unwrap_or_default();

            let mut any_cancelled = false;
            let mut result_blocks = Vec::with_capacity(ordered_ids.len());
            for id in ordered_ids {
                let Some(result) = results.remove(&id) else {
                    warn!(%id, "missing tool result for emitted tool_use; transcript may be unbalanced");
                    continue;
                };
                if result.user_cancelled {
                    any_cancelled = true;
                }
                result_blocks.push(ContentBlock::tool_result(id, result.content, result.is_error));
            }

            // §4.4 step 5 / §9 Open Question: always append the
            // tool_results collected so far before breaking, to keep
            // T-Balance even on a mid-iteration cancel.
            transcript.push(Message::tool_results(result_blocks));

            if any_cancelled {
                self.io.system_message("[cancelled]");
                return LoopOutcome::Cancelled;
            }
        }
    }

    /// Drives the chunk stream to completion (or turn cancellation),
    /// forwarding text deltas to the UI and folding chunks through the
    /// reducer. Returns `None` if the turn token fired before the model
    /// finished streaming.
    async fn consume_stream(
        &self,
        mut stream: crate::domain::llm::ChunkStream,
        cancel_turn: &CancellationToken,
    ) -> Option<crate::domain::llm::StreamResult> {
        let mut reducer = crate::infrastructure::llm::StreamReducer::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel_turn.cancelled() => return None,
                next = stream.next() => {
                    match next {
                        Some(Ok(chunk)) => {
                            if let Some(text) = &chunk.text_delta {
                                self.io.text_delta(text);
                            }
                            reducer.fold(chunk);
                        }
                        Some(Err(e)) => {
                            self.io.error(&format!("stream error: {e}"));
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
        Some(reducer.finish())
    }
}

/// Convenience constructor for a fresh turn's cancellation scope: a child
/// of nothing, i.e. the root of its own subtree (§5's "turn token").
pub fn new_turn_token() -> CancellationToken {
    CancellationToken::new()
}

pub fn user_message(text: impl Into<String>) -> Message {
    Message { role: Role::User, content: vec![ContentBlock::text(text)] }
}
