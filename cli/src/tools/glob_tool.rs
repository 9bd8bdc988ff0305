// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `glob` — filename pattern matching. Grounded in the teacher pack's
//! `sven-tools` `GlobFileSearchTool`, but built on the `glob` crate instead
//! of shelling out to `find` — avoids command-injection surface and lets
//! us sort by modification time without parsing `find -printf` output.

use std::time::SystemTime;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

static EXCLUDED_DIRS: &[&str] = &[".git", "target", "node_modules", ".svn", "__pycache__", ".mypy_cache"];

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Finds files by name pattern, e.g. '**/*.rs' or 'src/**/*.{ts,tsx}'.\n\
         Results are sorted newest-modified first. limit: 100 by default.\n\
         Excludes .git/ target/ node_modules/. For content search use grep."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "pattern": {"type": "string", "description": "Glob pattern, relative to path"},
            "path": {"type": "string", "description": "Directory to search from (default: current directory)"},
            "limit": {"type": "integer", "description": "Maximum number of matches to return (default 100)"}
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
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'pattern'".to_string()))?
            .to_string();
        let base = params.get("path").and_then(Value::as_str).unwrap_or(".").to_string();
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(100) as usize;

        debug!(pattern, base, limit, "glob");

        let full_pattern = format!("{}/{}", base.trim_end_matches('/'), pattern);

        let result = tokio::task::spawn_blocking(move || run_glob(&full_pattern, limit))
            .await
            .map_err(|e| ToolError::Execution(format!("glob task panicked: {e}")))?;

        match result {
            Ok(output) if output.is_empty() => Ok(ToolResult::ok("(no matches)")),
            Ok(output) => Ok(ToolResult::ok(output)),
            Err(e) => Ok(ToolResult::error(format!("glob error: {e}"))),
        }
    }
}

fn run_glob(pattern: &str, limit: usize) -> Result<String, glob::PatternError> {
    let mut matches: Vec<(SystemTime, String)> = Vec::new();

    for entry in glob::glob(pattern)?.flatten() {
        if entry
            .components()
            .any(|c| EXCLUDED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
        {
            continue;
        }
        let modified = entry.metadata().and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
        matches.push((modified, entry.to_string_lossy().into_owned()));
    }

    matches.sort_by(|a, b| b.0.cmp(&a.0));
    let total = matches.len();
    let mut lines: Vec<String> = matches.into_iter().take(limit).map(|(_, p)| p).collect();
    if total > limit {
        lines.push(format!("...[{} more matches not shown — narrow the pattern]", total - limit));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.rs"), "").await.unwrap();
        tokio::fs::write(dir.path().join("b.txt"), "").await.unwrap();
        let tool = GlobTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"pattern": "*.rs", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert!(result.content.contains("a.rs"));
        assert!(!result.content.contains("b.txt"));
    }

    #[tokio::test]
    async fn no_match_reports_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GlobTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"pattern": "*.nonexistent", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(result.content, "(no matches)");
    }

    #[tokio::test]
    async fn missing_pattern_is_invalid_params() {
        let tool = GlobTool;
        let err = tool.execute(CancellationToken::new(), json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn excludes_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join(".git")).await.unwrap();
        tokio::fs::write(dir.path().join(".git/config.rs"), "").await.unwrap();
        tokio::fs::write(dir.path().join("main.rs"), "").await.unwrap();
        let tool = GlobTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"pattern": "**/*.rs", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert!(result.content.contains("main.rs"));
        assert!(!result.content.contains(".git"));
    }
}
