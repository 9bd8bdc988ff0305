// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `list_dir` — directory listing with depth/limit caps. Grounded in the
//! teacher pack's `sven-tools` `ListDirTool` (trailing slash for
//! directories, depth-first ordering, excluded-dir list); walked with the
//! `walkdir` crate instead of the teacher's hand-rolled async recursion
//! since `async-recursion` isn't part of this workspace's dependency set.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

static EXCLUDED_DIRS: &[&str] = &[".git", "target", "node_modules", ".svn", "__pycache__", ".mypy_cache"];

fn is_excluded(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List directory contents. depth: default 2, max 5. limit: 100 entries by default.\n\
         Excludes .git/ target/ node_modules/. Directories have trailing /.\n\
         For file pattern search use glob; for content search use grep."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "path": {"type": "string", "description": "Absolute or relative path to the directory"},
            "depth": {"type": "integer", "description": "Maximum recursion depth (default 2, max 5)"},
            "limit": {"type": "integer", "description": "Maximum number of entries to return (default 100)"}
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'path'".to_string()))?
            .to_string();
        let depth = params.get("depth").and_then(Value::as_u64).unwrap_or(2).min(5) as usize;
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(100) as usize;

        debug!(path, depth, limit, "list_dir");

        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_dir() => {}
            Ok(_) => return Ok(ToolResult::error(format!("not a directory: {path}"))),
            Err(e) => return Ok(ToolResult::error(format!("cannot access {path}: {e}"))),
        }

        let (entries, truncated) = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || collect_entries(&path, depth, limit))
                .await
                .unwrap_or_else(|_| (Vec::new(), false))
        };

        if entries.is_empty() {
            return Ok(ToolResult::ok("(empty directory)"));
        }

        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n...[output truncated at {limit} entries]"));
        }
        Ok(ToolResult::ok(output))
    }
}

fn collect_entries(base: &str, max_depth: usize, limit: usize) -> (Vec<String>, bool) {
    let mut entries = Vec::new();
    let mut truncated = false;

    let walker = WalkDir::new(base)
        .min_depth(1)
        .max_depth(max_depth.max(1))
        .sort_by(|a, b| {
            let a_dir = a.file_type().is_dir();
            let b_dir = b.file_type().is_dir();
            b_dir.cmp(&a_dir).then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !(e.file_type().is_dir() && is_excluded(&e.file_name().to_string_lossy()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.depth() == 0 {
            continue;
        }
        if entries.len() >= limit {
            truncated = true;
            break;
        }
        let rel = entry
            .path()
            .strip_prefix(base)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if entry.file_type().is_dir() {
            entries.push(format!("{rel}/"));
        } else {
            entries.push(rel.to_string());
        }
    }

    (entries, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_directory_contents() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListDirTool;
        let result = tool.execute(CancellationToken::new(), json!({"path": dir.path().to_str().unwrap()})).await.unwrap();
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn dirs_have_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("subdir")).await.unwrap();
        tokio::fs::write(dir.path().join("file.txt"), "x").await.unwrap();
        let tool = ListDirTool;
        let result = tool.execute(CancellationToken::new(), json!({"path": dir.path().to_str().unwrap()})).await.unwrap();
        assert!(result.content.contains("subdir/"));
        assert!(result.content.contains("file.txt"));
    }

    #[tokio::test]
    async fn missing_path_is_invalid_params() {
        let tool = ListDirTool;
        let err = tool.execute(CancellationToken::new(), json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn depth_zero_shows_only_immediate_children() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("subdir/nested")).await.unwrap();
        tokio::fs::write(dir.path().join("top.txt"), "x").await.unwrap();
        tokio::fs::write(dir.path().join("subdir/inner.txt"), "x").await.unwrap();
        let tool = ListDirTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"path": dir.path().to_str().unwrap(), "depth": 0}))
            .await
            .unwrap();
        // depth=0 is coerced up to 1 (min(1)) so immediate children still show
        assert!(result.content.contains("top.txt"));
        assert!(result.content.contains("subdir/"));
        assert!(!result.content.contains("inner.txt"));
    }

    #[tokio::test]
    async fn nonexistent_dir_is_error() {
        let tool = ListDirTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"path": "/no/such/dir/xyzzy"}))
            .await
            .unwrap();
        assert!(result.is_error);
    }
}
