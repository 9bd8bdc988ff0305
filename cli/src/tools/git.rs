// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `git_status` / `git_diff` / `git_log` — read-only repository inspection,
//! shelling out to the system `git` binary. Grounded in the teacher pack's
//! `RunTerminalCommandTool` commit-workflow guidance (status/diff/log as
//! the standard pre-commit trio), split into three dedicated read-only
//! tools instead of free-form shell so they're eligible for parallel
//! dispatch in the agent loop (§4.4) and fall under the executor's
//! `git_*` truncation budget (§4.3).

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

async fn run_git(args: &[&str], cwd: Option<&str>) -> Result<ToolResult, ToolError> {
    let mut cmd = Command::new("git");
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    match cmd.output().await {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if output.status.success() {
                Ok(ToolResult::ok(if stdout.trim().is_empty() { "(no output)".to_string() } else { stdout }))
            } else {
                Ok(ToolResult::error(if stderr.is_empty() { stdout } else { stderr }))
            }
        }
        Err(e) => Ok(ToolResult::error(format!("git spawn error: {e}"))),
    }
}

fn cwd_param(params: &Value) -> Option<&str> {
    params.get("path").and_then(Value::as_str)
}

pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Shows the working tree status (git status --porcelain=v1 -b)."
    }

    fn parameter_schema(&self) -> Value {
        json!({"path": {"type": "string", "description": "Repository directory (default: current directory)"}})
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        debug!("git_status");
        run_git(&["status", "--porcelain=v1", "-b"], cwd_param(&params)).await
    }
}

pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Shows unstaged (default) or staged (staged=true) changes as a unified diff."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "path": {"type": "string", "description": "Repository directory (default: current directory)"},
            "staged": {"type": "boolean", "description": "Show staged changes instead of unstaged (default false)"}
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let staged = params.get("staged").and_then(Value::as_bool).unwrap_or(false);
        debug!(staged, "git_diff");
        let args: &[&str] = if staged { &["diff", "--cached"] } else { &["diff"] };
        run_git(args, cwd_param(&params)).await
    }
}

pub struct GitLogTool;

#[async_trait]
impl Tool for GitLogTool {
    fn name(&self) -> &str {
        "git_log"
    }

    fn description(&self) -> &str {
        "Shows recent commit history (git log --oneline). count: default 10, max 100."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "path": {"type": "string", "description": "Repository directory (default: current directory)"},
            "count": {"type": "integer", "description": "Number of commits to show (default 10, max 100)"}
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let count = params.get("count").and_then(Value::as_u64).unwrap_or(10).min(100);
        debug!(count, "git_log");
        let count_arg = format!("-{count}");
        run_git(&["log", "--oneline", &count_arg], cwd_param(&params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        run_git(&["init", "-q"], Some(path)).await.unwrap();
        run_git(&["config", "user.email", "test@example.com"], Some(path)).await.unwrap();
        run_git(&["config", "user.name", "Test"], Some(path)).await.unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hello\n").await.unwrap();
        run_git(&["add", "a.txt"], Some(path)).await.unwrap();
        run_git(&["commit", "-q", "-m", "init"], Some(path)).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn status_reports_clean_tree() {
        let dir = init_repo().await;
        let tool = GitStatusTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn log_shows_the_commit() {
        let dir = init_repo().await;
        let tool = GitLogTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"path": dir.path().to_str().unwrap(), "count": 5}))
            .await
            .unwrap();
        assert!(result.content.contains("init"));
    }

    #[tokio::test]
    async fn diff_reports_unstaged_change() {
        let dir = init_repo().await;
        tokio::fs::write(dir.path().join("a.txt"), "hello again\n").await.unwrap();
        let tool = GitDiffTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert!(result.content.contains("hello again"));
    }
}
