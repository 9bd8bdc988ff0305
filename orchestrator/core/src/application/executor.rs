//! Executor
//!
//! Orchestrates the permission policy, hook manager, and file-change
//! tracker around one tool invocation (component F, §4.3): look up the
//! tool, gate it, fire pre-hooks, run it under a timeout-bounded
//! cancellation token, track file changes, run the post-edit
//! lint/test/auto-commit chain, truncate the result, and fire post-hooks.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Generalises the teacher's `ToolInvocationService`
//!   orchestration shape (validate → dispatch → record) to the spec's
//!   11-step single-call algorithm.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::config::{LintConfig, TestConfig};
use crate::domain::file_tracker::{FileChangeTracker, FileOp};
use crate::domain::hook::{HookEvent, ToolPayload, ToolResultPayload};
use crate::domain::io::Io;
use crate::domain::message::ToolCallId;
use crate::domain::permission::{Decision, PermissionPolicy};
use crate::domain::tool::{ToolRegistry, ToolResult};
use crate::infrastructure::hook_runner;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);
const LINT_TIMEOUT: Duration = Duration::from_secs(30);
const TEST_TIMEOUT: Duration = Duration::from_secs(60);
const COMMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-tool truncation budgets (§4.3 step 10).
fn byte_budget(tool_name: &str) -> usize {
    match tool_name {
        "read_file" | "grep" | "bash" | "web_fetch" | "web_search" | "repo_map" | "symbol_nav" | "doc_context" => 32 * 1024,
        name if name.starts_with("git_") || matches!(name, "list_dir" | "glob") => 16 * 1024,
        _ => 4 * 1024,
    }
}

/// Keeps 60% head + 40% tail, joined by an omission marker, once content
/// exceeds its tool's byte budget.
fn truncate(content: &str, limit: usize) -> (String, bool) {
    if content.len() <= limit {
        return (content.to_string(), false);
    }
    let head_len = (limit as f64 * 0.6).ceil() as usize;
    let tail_len = (limit as f64 * 0.4).floor() as usize;
    let head = take_chars_bytes(content, head_len, true);
    let tail = take_chars_bytes(content, tail_len, false);
    let omitted = content.len().saturating_sub(head.len() + tail.len());
    (format!("{head}\n\n[...{omitted} chars omitted...]\n\n{tail}"), true)
}

/// Slices at a char boundary at or before the requested byte length so we
/// never split a UTF-8 sequence.
fn take_chars_bytes(s: &str, max_bytes: usize, from_start: bool) -> String {
    if from_start {
        let mut end = max_bytes.min(s.len());
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    } else {
        let mut start = s.len().saturating_sub(max_bytes);
        while start < s.len() && !s.is_char_boundary(start) {
            start += 1;
        }
        s[start..].to_string()
    }
}

fn file_path_param(params: &Value) -> Option<&str> {
    params.get("file_path").and_then(Value::as_str)
}

async fn run_shell(command: &str, timeout: Duration) -> Option<(i32, String, String)> {
    let spawn = Command::new("sh").arg("-c").arg(command).stdout(Stdio::piped()).stderr(Stdio::piped()).spawn();
    let mut child = spawn.ok()?;
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Some((
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )),
        _ => None,
    }
}

pub struct Executor {
    registry: ToolRegistry,
    policy: Arc<PermissionPolicy>,
    hooks: crate::domain::hook::HookManager,
    tracker: Arc<FileChangeTracker>,
    io: Arc<dyn Io>,
    confirmation_lock: tokio::sync::Mutex<()>,
    active_tokens: Mutex<HashMap<ToolCallId, CancellationToken>>,
    lint: LintConfig,
    test: TestConfig,
    auto_commit: bool,
}

impl Executor {
    pub fn new(
        registry: ToolRegistry,
        policy: Arc<PermissionPolicy>,
        hooks: crate::domain::hook::HookManager,
        tracker: Arc<FileChangeTracker>,
        io: Arc<dyn Io>,
        lint: LintConfig,
        test: TestConfig,
        auto_commit: bool,
    ) -> Self {
        Self {
            registry,
            policy,
            hooks,
            tracker,
            io,
            confirmation_lock: tokio::sync::Mutex::new(()),
            active_tokens: Mutex::new(HashMap::new()),
            lint,
            test,
            auto_commit,
        }
    }

    /// Called by the UI when the user presses Esc while a tool is running.
    pub fn cancel_tool(&self, id: ToolCallId) {
        if let Some(token) = self.active_tokens.lock().get(&id) {
            token.cancel();
        }
    }

    pub async fn execute(&self, cancel_turn: &CancellationToken, id: ToolCallId, name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.registry.get(name) else {
            return ToolResult::error(format!("unknown tool: {name}"));
        };

        if cancel_turn.is_cancelled() {
            return ToolResult::cancelled();
        }

        match self.policy.decide(name, tool.is_read_only(), &params) {
            Decision::Deny(reason) => return ToolResult::error(format!("Blocked: {reason}")),
            Decision::NeedConfirmation => {
                let _guard = self.confirmation_lock.lock().await;
                let approved = self.io.confirm(name, &params, tool.permission_level()).await;
                if !approved {
                    return ToolResult::cancelled();
                }
                self.policy.learn_approval(name, &params);
            }
            Decision::Allow => {}
        }

        if let Some(blocked) = self.run_pre_hooks(name, &params).await {
            return blocked;
        }

        let tool_token = cancel_turn.child_token();
        self.active_tokens.lock().insert(id, tool_token.clone());

        let timed_out = Arc::new(AtomicBool::new(false));
        let timeout_guard = {
            let token = tool_token.clone();
            let flag = timed_out.clone();
            tokio::spawn(async move {
                tokio::time::sleep(DEFAULT_TOOL_TIMEOUT).await;
                flag.store(true, Ordering::SeqCst);
                token.cancel();
            })
        };

        let pre_existing_op = name.eq("write_file")
            .then(|| file_path_param(&params))
            .flatten()
            .map(|p| Path::new(p).exists());

        let exec_result = tool.execute(tool_token.clone(), params.clone()).await;

        timeout_guard.abort();
        self.active_tokens.lock().remove(&id);

        // Check the timeout flag before looking at how the tool itself
        // reported cancellation: a tool observing the shared tool_token
        // fire (e.g. `cli/src/tools/bash.rs`'s `Ok(ToolResult::cancelled())`)
        // can't tell a timeout apart from a user Esc, so the executor is the
        // only place that still knows which one actually happened.
        let mut result = if timed_out.load(Ordering::SeqCst) {
            ToolResult::error(format!("Timeout: exceeded {}s", DEFAULT_TOOL_TIMEOUT.as_secs()))
        } else {
            match exec_result {
                Ok(result) => result,
                Err(e) => {
                    if tool_token.is_cancelled() {
                        ToolResult::cancelled()
                    } else {
                        ToolResult::error(format!("error: {e}"))
                    }
                }
            }
        };

        if !result.is_error && !result.user_cancelled {
            self.record_file_change(name, &params, pre_existing_op);
            self.run_validation_chain(name, &params, &mut result).await;
        }

        let (truncated_content, truncated) = truncate(&result.content, byte_budget(name));
        result.content = truncated_content;
        result.truncated = result.truncated || truncated;

        self.run_post_hooks(name, &params, &result).await;

        result
    }

    async fn run_pre_hooks(&self, name: &str, params: &Value) -> Option<ToolResult> {
        if self.hooks.is_empty() {
            return None;
        }
        let payload = ToolPayload { tool_name: name.to_string(), params: params.clone() };
        let payload_value = serde_json::to_value(&payload).ok()?;
        for hook in self.hooks.matching(HookEvent::PreTool, name) {
            let outcome = hook_runner::run(hook, &payload_value).await;
            if outcome.is_hard_block() {
                return Some(ToolResult::error(format!("Blocked by hook: {}", outcome.stderr)));
            }
        }
        None
    }

    async fn run_post_hooks(&self, name: &str, params: &Value, result: &ToolResult) {
        if self.hooks.is_empty() {
            return;
        }
        let payload = ToolResultPayload {
            tool_name: name.to_string(),
            params: params.clone(),
            result: result.content.clone(),
            is_error: result.is_error,
        };
        let Ok(payload_value) = serde_json::to_value(&payload) else { return };
        for hook in self.hooks.matching(HookEvent::PostTool, name) {
            let _ = hook_runner::run(hook, &payload_value).await;
        }
    }

    fn record_file_change(&self, name: &str, params: &Value, pre_existing: Option<bool>) {
        match name {
            "write_file" => {
                if let Some(path) = file_path_param(params) {
                    let op = if pre_existing == Some(true) { FileOp::Modified } else { FileOp::Created };
                    self.tracker.record(path, op, name);
                }
            }
            "edit_file" => {
                if let Some(path) = file_path_param(params) {
                    self.tracker.record(path, FileOp::Modified, name);
                }
            }
            "bash" => {
                if let Some(command) = params.get("command").and_then(Value::as_str) {
                    if mutating_bash_command(command) {
                        self.tracker.record(command.split_whitespace().nth(1).unwrap_or("?"), FileOp::Modified, name);
                    }
                }
            }
            _ => {}
        }
    }

    async fn run_validation_chain(&self, name: &str, params: &Value, result: &mut ToolResult) {
        if !matches!(name, "write_file" | "edit_file") {
            return;
        }
        let Some(path) = file_path_param(params) else { return };

        if self.lint.enabled {
            self.run_templated(path, &self.lint.commands, LINT_TIMEOUT, "[Lint errors]", 4 * 1024, result).await;
        }
        if self.test.enabled {
            self.run_templated(
                path,
                &self.test.commands,
                TEST_TIMEOUT,
                "[Test failures]\n\nFix the test failures in the code you just edited.",
                8 * 1024,
                result,
            )
            .await;
        }
        if self.auto_commit {
            self.run_auto_commit(path, name).await;
        }
    }

    async fn run_templated(
        &self,
        path: &str,
        commands: &HashMap<String, String>,
        timeout: Duration,
        label: &str,
        cap: usize,
        result: &mut ToolResult,
    ) {
        let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) else { return };
        let Some(template) = commands.get(ext) else { return };
        let command = template.replace("{{.file}}", path);

        if let Some((code, stdout, stderr)) = run_shell(&command, timeout).await {
            if code != 0 {
                let (capped, _) = truncate(&format!("{stdout}{stderr}"), cap);
                result.content.push_str(&format!("\n\n{label}\n{capped}"));
            }
        }
    }

    async fn run_auto_commit(&self, path: &str, tool_name: &str) {
        let _ = run_shell(&format!("git add -- {path}"), COMMIT_TIMEOUT).await;
        let diff = run_shell("git diff --cached --quiet", COMMIT_TIMEOUT).await;
        let staged_nonempty = matches!(diff, Some((code, _, _)) if code != 0);
        if staged_nonempty {
            let basename = Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path);
            let message = format!("apexion: {tool_name} {basename}");
            let _ = run_shell(&format!("git commit -m \"{message}\" --no-verify"), COMMIT_TIMEOUT).await;
        }
    }
}

fn mutating_bash_command(command: &str) -> bool {
    let first = command.split_whitespace().next().unwrap_or("");
    matches!(first, "rm" | "mv" | "cp" | "mkdir" | "touch" | "chmod" | "chown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_head_and_tail_within_budget() {
        let content = "a".repeat(100);
        let (result, truncated) = truncate(&content, 20);
        assert!(truncated);
        assert!(result.len() <= 20 + "\n\n[...N chars omitted...]\n\n".len() + 10);
        assert!(result.starts_with("aaaaaaaaaaaa"));
    }

    #[test]
    fn truncate_is_a_no_op_under_the_limit() {
        let (result, truncated) = truncate("short", 100);
        assert!(!truncated);
        assert_eq!(result, "short");
    }

    #[test]
    fn byte_budget_matches_tool_categories() {
        assert_eq!(byte_budget("read_file"), 32 * 1024);
        assert_eq!(byte_budget("git_log"), 16 * 1024);
        assert_eq!(byte_budget("list_dir"), 16 * 1024);
        assert_eq!(byte_budget("write_file"), 4 * 1024);
    }

    #[test]
    fn mutating_bash_commands_are_recognised() {
        assert!(mutating_bash_command("rm -rf build"));
        assert!(mutating_bash_command("mkdir -p out"));
        assert!(!mutating_bash_command("npm test"));
    }
}
