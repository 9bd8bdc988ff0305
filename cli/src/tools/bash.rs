// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `bash` — shell command execution under a per-call timeout. Grounded in
//! the teacher pack's `sven-tools` `RunTerminalCommandTool`; cancellation
//! and the output byte cap are adapted to run under the executor's
//! cancellation token instead of a fixed internal timeout (the executor
//! already applies a 300 s ceiling and per-tool truncation, §4.3).

use std::os::unix::process::CommandExt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

pub struct BashTool;

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Executes a shell command. Use for git/cargo/make/build tooling, not for file\n\
         operations — use read_file/write_file/edit_file/glob/grep for those instead.\n\
         Quote paths containing spaces. Chain dependent commands with '&&'; call the\n\
         tool multiple times in one turn for independent commands that can run in\n\
         parallel. Avoid long-running servers or watchers — prefer one-shot commands.\n\
         Never run destructive git operations (force-push, reset --hard) or skip hooks\n\
         (--no-verify) without an explicit request. Set workdir to run outside the\n\
         current directory."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "command": {"type": "string", "description": "The shell command to execute"},
            "workdir": {"type": "string", "description": "Working directory (default: current directory)"}
        })
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Execute
    }

    async fn execute(&self, cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'command'".to_string()))?;
        let workdir = params.get("workdir").and_then(Value::as_str);

        debug!(command, workdir, "bash");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        // Own process group (pgid = pid) so cancellation can signal the
        // whole tree sh spawns, not just sh itself.
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(format!("spawn error: {e}"))),
        };
        let pid = child.id();

        tokio::select! {
            output = child.wait_with_output() => {
                match output {
                    Ok(output) => Ok(render_output(&output)),
                    Err(e) => Ok(ToolResult::error(format!("exec error: {e}"))),
                }
            }
            _ = cancel.cancelled() => {
                if let Some(pid) = pid {
                    kill_process_group(pid as i32).await;
                }
                Ok(ToolResult::cancelled())
            }
        }
    }
}

/// Signals the entire process group with SIGTERM, waits 200 ms for a clean
/// exit, then SIGKILL (§5 "Shared-resource discipline", §8 scenario 6).
/// `process_group(0)` made `pid` its own process group leader, so `killpg`
/// reaches the shell and anything it spawned.
async fn kill_process_group(pid: i32) {
    unsafe {
        libc::killpg(pid, libc::SIGTERM);
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    unsafe {
        libc::killpg(pid, libc::SIGKILL);
    }
}

fn render_output(output: &std::process::Output) -> ToolResult {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut content = String::new();
    if !stdout.is_empty() {
        content.push_str(&stdout);
    }
    if !stderr.is_empty() {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str("[stderr]\n");
        content.push_str(&stderr);
    }
    if content.is_empty() {
        content = format!("[exit {}]", output.status.code().unwrap_or(-1));
    }

    if output.status.success() {
        ToolResult::ok(content)
    } else {
        let code = output.status.code().unwrap_or(-1);
        ToolResult::error(format!("[exit {code}]\n{content}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_command_and_captures_stdout() {
        let tool = BashTool;
        let result = tool.execute(CancellationToken::new(), json!({"command": "echo hello"})).await.unwrap();
        assert!(!result.is_error);
        assert!(result.content.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error_result() {
        let tool = BashTool;
        let result = tool.execute(CancellationToken::new(), json!({"command": "exit 3"})).await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("[exit 3]"));
    }

    #[tokio::test]
    async fn cancellation_before_completion_returns_cancelled() {
        let tool = BashTool;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = tool.execute(cancel, json!({"command": "sleep 5"})).await.unwrap();
        assert!(result.user_cancelled);
    }

    #[tokio::test]
    async fn cancellation_mid_run_kills_the_subprocess_tree() {
        // A child that spawns a grandchild via the shell; both must die
        // when the tool token fires, not just the immediate `sh` pid.
        let tool = BashTool;
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let run = tokio::spawn(async move {
            tool.execute(cancel_clone, json!({"command": "sleep 30 & wait"})).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = run.await.unwrap().unwrap();
        assert!(result.user_cancelled);
    }
}
