// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `grep` — pattern search, preferring `rg` and falling back to `grep` when
//! ripgrep isn't on PATH. Grounded in the teacher pack's `sven-tools`
//! `GrepTool`, adapted onto `apexion_core`'s `Tool` trait (single `params`
//! map instead of a `ToolCall`, and the executor — not this tool — owns
//! final output truncation, §4.3).

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Pattern search built on ripgrep (falls back to grep if rg isn't on PATH).\n\
         pattern: full regex (escape literal braces: \\{\\}). include: glob filter (*.rs, **/*.{ts,tsx}).\n\
         case_sensitive: true by default. limit: 100 by default.\n\
         output_mode: content (default, file:line:col:text) | files_with_matches | count\n\
         context_lines: lines of context before+after each match (default 0)."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "pattern": {"type": "string", "description": "Regular expression pattern to search for"},
            "path": {"type": "string", "description": "File or directory to search in (default: current directory)"},
            "include": {"type": "string", "description": "Glob pattern to filter files, e.g. '*.rs'"},
            "case_sensitive": {"type": "boolean", "description": "Case-sensitive search (default true)"},
            "limit": {"type": "integer", "description": "Maximum number of matches to return (default 100)"},
            "output_mode": {"type": "string", "enum": ["content", "files_with_matches", "count"], "description": "Output format (default content)"},
            "context_lines": {"type": "integer", "description": "Lines of context before and after each match (default 0)"}
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let pattern = params
            .get("pattern")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'pattern'".to_string()))?;
        let path = params.get("path").and_then(Value::as_str).unwrap_or(".");
        let include = params.get("include").and_then(Value::as_str);
        let case_sensitive = params.get("case_sensitive").and_then(Value::as_bool).unwrap_or(true);
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(100) as usize;
        let output_mode = params.get("output_mode").and_then(Value::as_str).unwrap_or("content");
        let context_lines = params.get("context_lines").and_then(Value::as_u64).unwrap_or(0) as usize;

        debug!(pattern, path, output_mode, "grep");

        match run_search(pattern, path, include, case_sensitive, limit, output_mode, context_lines).await {
            Ok(output) if output.trim().is_empty() => Ok(ToolResult::ok("(no matches)")),
            Ok(output) => Ok(ToolResult::ok(output)),
            Err(e) => Ok(ToolResult::error(format!("grep error: {e}"))),
        }
    }
}

async fn run_search(
    pattern: &str,
    path: &str,
    include: Option<&str>,
    case_sensitive: bool,
    limit: usize,
    output_mode: &str,
    context_lines: usize,
) -> std::io::Result<String> {
    let has_rg = Command::new("which")
        .arg("rg")
        .stdin(Stdio::null())
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false);

    let output = if has_rg {
        let mut args = vec!["--color".to_string(), "never".to_string()];
        match output_mode {
            "files_with_matches" => args.push("-l".to_string()),
            "count" => args.push("-c".to_string()),
            _ => {
                args.push("--vimgrep".to_string());
                args.push("--no-heading".to_string());
            }
        }
        if !case_sensitive {
            args.push("--ignore-case".to_string());
        }
        if context_lines > 0 && output_mode == "content" {
            args.push(format!("-C{context_lines}"));
        }
        if let Some(glob) = include {
            args.push("-g".to_string());
            args.push(glob.to_string());
        }
        args.push(pattern.to_string());
        args.push(path.to_string());

        Command::new("rg").args(&args).stdin(Stdio::null()).output().await?
    } else {
        let mut args = vec!["-rn".to_string()];
        match output_mode {
            "files_with_matches" => args.push("-l".to_string()),
            "count" => args.push("-c".to_string()),
            _ => {}
        }
        if !case_sensitive {
            args.push("-i".to_string());
        }
        if context_lines > 0 && output_mode == "content" {
            args.push(format!("-C{context_lines}"));
        }
        if let Some(glob) = include {
            args.push("--include".to_string());
            args.push(glob.to_string());
        }
        args.push(pattern.to_string());
        args.push(path.to_string());

        Command::new("grep").args(&args).stdin(Stdio::null()).output().await?
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().take(limit).collect();
    let mut result = lines.join("\n");
    let total = stdout.lines().count();
    if total > limit {
        result.push_str(&format!("\n...[{} more matches not shown — narrow with path= or include=]", total - limit));
    }
    Ok(result)
}
