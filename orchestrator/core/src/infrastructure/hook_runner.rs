// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Executes a compiled [`HookEntry`](crate::domain::hook::HookEntry) as a
//! subprocess: the JSON payload goes in on stdin, the command runs under a
//! wall-clock timeout, and the exit code is handed back uninterpreted — it
//! is the caller's job (the executor) to treat a pre-tool exit code 2 as a
//! hard block per §4.6.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

use crate::domain::hook::HookEntry;

#[derive(Debug, Clone)]
pub struct HookOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl HookOutcome {
    /// Pre-tool hooks use exit code 2 as "block the tool call" (§4.6).
    pub fn is_hard_block(&self) -> bool {
        self.exit_code == Some(2)
    }
}

pub async fn run(hook: &HookEntry, payload: &serde_json::Value) -> HookOutcome {
    let payload_json = serde_json::to_string(payload).unwrap_or_default();

    let spawn = Command::new("sh")
        .arg("-c")
        .arg(&hook.command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawn {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %hook.command, error = %e, "failed to spawn hook");
            return HookOutcome { exit_code: None, stdout: String::new(), stderr: e.to_string(), timed_out: false };
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(payload_json.as_bytes()).await;
    }

    let timeout = std::time::Duration::from_secs(hook.timeout_s);
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => HookOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            timed_out: false,
        },
        Ok(Err(e)) => HookOutcome { exit_code: None, stdout: String::new(), stderr: e.to_string(), timed_out: false },
        Err(_) => {
            warn!(command = %hook.command, timeout_s = hook.timeout_s, "hook timed out");
            HookOutcome { exit_code: None, stdout: String::new(), stderr: "hook timed out".to_string(), timed_out: true }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hook::HookEvent;

    fn entry(command: &str, timeout_s: u64) -> HookEntry {
        HookEntry { event: HookEvent::PreTool, matcher: regex::Regex::new(".*").unwrap(), command: command.to_string(), timeout_s }
    }

    #[tokio::test]
    async fn exit_code_two_is_a_hard_block() {
        let outcome = run(&entry("exit 2", 5), &serde_json::json!({})).await;
        assert!(outcome.is_hard_block());
    }

    #[tokio::test]
    async fn exit_code_zero_is_not_a_hard_block() {
        let outcome = run(&entry("exit 0", 5), &serde_json::json!({})).await;
        assert!(!outcome.is_hard_block());
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    async fn slow_hook_times_out() {
        let outcome = run(&entry("sleep 5", 0), &serde_json::json!({})).await;
        assert!(outcome.timed_out);
    }
}
