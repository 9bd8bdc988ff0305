// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sub-agent orchestration (component H, §4.5): the `task` tool spawns a
//! bounded, isolated agent loop with its own tool registry and a buffer
//! IO that discards display events but reports tool-call progress back to
//! the parent UI.
//!
//! Grounded on the teacher's `infrastructure/human_input_service.rs`
//! pending-request map, generalised here from approval-id keying to
//! task-id keying for the progress channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::domain::file_tracker::FileChangeTracker;
use crate::domain::hook::HookManager;
use crate::domain::io::Io;
use crate::domain::llm::Provider;
use crate::domain::message::{Message, ToolCallId};
use crate::domain::permission::{PermissionConfig, PermissionMode, PermissionPolicy};
use crate::domain::tool::{PermissionLevel, Tool, ToolError, ToolRegistry, ToolResult};

use super::agent_loop::{user_message, AgentLoop};
use super::executor::Executor;

const WALLCLOCK_CAP: Duration = Duration::from_secs(120);
const OUTPUT_CAP_BYTES: usize = 24 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAgentMode {
    Explore,
    Plan,
    Code,
}

impl SubAgentMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "explore" => Some(Self::Explore),
            "plan" => Some(Self::Plan),
            "code" => Some(Self::Code),
            _ => None,
        }
    }
}

/// Emitted by the buffer IO each time the sub-agent starts or finishes a
/// tool call, so the parent UI can render "└ <tool> (N calls)".
#[derive(Debug, Clone)]
pub struct SubAgentProgress {
    pub task_id: String,
    pub tool_name: String,
    pub tool_count: usize,
    pub done: bool,
}

pub type ProgressSink = Arc<dyn Fn(SubAgentProgress) + Send + Sync>;

/// Discards every display event (thinking/text-delta/tool-start spam)
/// except text accumulation, which becomes the sub-agent's returned
/// content. Tool events drive the parent-facing progress callback
/// instead of being rendered directly.
struct BufferIo {
    task_id: String,
    text: Arc<Mutex<String>>,
    tool_count: AtomicUsize,
    progress: ProgressSink,
}

#[async_trait]
impl Io for BufferIo {
    async fn read_input(&self) -> Option<String> {
        None
    }
    fn user_message(&self, _text: &str) {}
    fn thinking_start(&self) {}
    fn text_delta(&self, text: &str) {
        self.text.lock().push_str(text);
    }
    fn text_done(&self, _full: &str) {}
    fn tool_start(&self, _id: ToolCallId, name: &str, _params: &Value) {
        let count = self.tool_count.fetch_add(1, Ordering::SeqCst) + 1;
        (self.progress)(SubAgentProgress { task_id: self.task_id.clone(), tool_name: name.to_string(), tool_count: count, done: false });
    }
    fn tool_done(&self, _id: ToolCallId, name: &str, _result: &str, _is_error: bool) {
        let count = self.tool_count.load(Ordering::SeqCst);
        (self.progress)(SubAgentProgress { task_id: self.task_id.clone(), tool_name: name.to_string(), tool_count: count, done: true });
    }
    /// A nested agent never interactively prompts: the parent already gave
    /// one-shot consent to launch a `code` sub-agent (§4.5), and
    /// `explore`/`plan` run under an always-allow policy that should never
    /// reach this path in the first place.
    async fn confirm(&self, _name: &str, _params: &Value, _level: PermissionLevel) -> bool {
        false
    }
    async fn ask_question(&self, _question: &str, _options: &[String]) -> String {
        String::new()
    }
    fn system_message(&self, _text: &str) {}
    fn error(&self, _text: &str) {}
    fn set_tokens(&self, _n: u32) {}
    fn set_context_info(&self, _used: u32, _total: u32) {}
    fn set_plan_mode(&self, _enabled: bool) {}
    fn set_cost(&self, _dollars: f64) {}
}

/// Caps `content` at [`OUTPUT_CAP_BYTES`], keeping the head and marking
/// the cut — unlike the executor's head+tail truncation, a sub-agent's
/// output is read top-to-bottom so only the tail is dropped.
fn cap_output(content: String) -> String {
    if content.len() <= OUTPUT_CAP_BYTES {
        return content;
    }
    let mut end = OUTPUT_CAP_BYTES;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n\n[...output truncated at {} bytes...]", &content[..end], OUTPUT_CAP_BYTES)
}

/// Shared collaborators a sub-agent borrows from its parent session:
/// everything except the tool registry and the IO port, which are
/// constructed fresh per spawn (§4.5).
pub struct SubAgentEnv {
    pub provider: Arc<dyn Provider>,
    pub explore_registry: ToolRegistry,
    pub code_registry: ToolRegistry,
    pub parent_policy: Arc<PermissionPolicy>,
    pub parent_io: Arc<dyn Io>,
    pub hooks: HookManager,
    pub tracker: Arc<FileChangeTracker>,
    pub lint: crate::domain::config::LintConfig,
    pub test: crate::domain::config::TestConfig,
    pub auto_commit: bool,
}

pub struct SubAgent {
    env: Arc<SubAgentEnv>,
}

impl SubAgent {
    pub fn new(env: Arc<SubAgentEnv>) -> Self {
        Self { env }
    }

    pub async fn run(&self, task_id: String, prompt: String, mode: SubAgentMode, progress: ProgressSink) -> ToolResult {
        if mode == SubAgentMode::Code {
            let approved = self
                .env
                .parent_io
                .confirm("task(code)", &serde_json::json!({"prompt": prompt}), PermissionLevel::Dangerous)
                .await;
            if !approved {
                return ToolResult::cancelled();
            }
        }

        let (registry, policy, system_prompt) = match mode {
            SubAgentMode::Explore => (
                self.env.explore_registry.clone(),
                Arc::new(PermissionPolicy::new(PermissionConfig { mode: PermissionMode::Yolo, ..Default::default() })),
                "You are a read-only exploration agent. Investigate and report findings; you cannot modify anything.".to_string(),
            ),
            SubAgentMode::Plan => (
                self.env.explore_registry.clone(),
                Arc::new(PermissionPolicy::new(PermissionConfig { mode: PermissionMode::Yolo, ..Default::default() })),
                "You are a planning agent. Investigate read-only, then produce a structured, numbered implementation plan. Do not modify anything.".to_string(),
            ),
            SubAgentMode::Code => (
                self.env.code_registry.clone(),
                self.env.parent_policy.clone(),
                "You are a coding sub-agent. Complete the assigned change using the available tools, then summarize what you did.".to_string(),
            ),
        };

        let text_buf = Arc::new(Mutex::new(String::new()));
        let buffer_io: Arc<dyn Io> = Arc::new(BufferIo {
            task_id,
            text: text_buf.clone(),
            tool_count: AtomicUsize::new(0),
            progress,
        });

        let executor = Arc::new(Executor::new(
            registry.clone(),
            policy,
            self.env.hooks.clone(),
            self.env.tracker.clone(),
            buffer_io.clone(),
            self.env.lint.clone(),
            self.env.test.clone(),
            self.env.auto_commit,
        ));

        let agent_loop = AgentLoop::new(self.env.provider.clone(), registry, executor, buffer_io.clone(), system_prompt, 0);

        let mut transcript = vec![user_message(prompt)];
        let turn_token = CancellationToken::new();

        let timed_out = match tokio::time::timeout(WALLCLOCK_CAP, agent_loop.run_turn(&mut transcript, turn_token.clone())).await {
            Ok(_outcome) => false,
            Err(_) => {
                turn_token.cancel();
                true
            }
        };

        let buffered = text_buf.lock().clone();
        let mut content = cap_output(buffered);
        if timed_out {
            content.push_str("\n\n[Sub-agent timed out, partial results above]");
        }

        ToolResult::ok(content)
    }
}

/// The `task` tool itself: the only built-in whose `execute` spawns a
/// full nested agent loop rather than performing a single operation.
pub struct TaskTool {
    env: Arc<SubAgentEnv>,
    progress: ProgressSink,
}

impl TaskTool {
    pub fn new(env: Arc<SubAgentEnv>, progress: ProgressSink) -> Self {
        Self { env, progress }
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Launch an isolated sub-agent to investigate, plan, or make a bounded code change. \
         mode=explore and mode=plan are read-only and safe; mode=code can modify files and \
         requires user confirmation. The sub-agent cannot itself spawn further sub-agents."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "prompt": {"type": "string", "description": "instructions for the sub-agent"},
            "mode": {"type": "string", "enum": ["explore", "plan", "code"]},
        })
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Dangerous
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let prompt = params
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'prompt'".to_string()))?
            .to_string();
        let mode = params
            .get("mode")
            .and_then(Value::as_str)
            .and_then(SubAgentMode::parse)
            .ok_or_else(|| ToolError::InvalidParams("'mode' must be one of explore, plan, code".to_string()))?;

        let task_id = uuid::Uuid::new_v4().to_string();
        let sub_agent = SubAgent::new(self.env.clone());
        Ok(sub_agent.run(task_id, prompt, mode, self.progress.clone()).await)
    }
}
