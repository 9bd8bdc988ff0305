// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `doc_context` — pulls the doc comment attached to a symbol's definition.
//! Complements `symbol_nav` (which locates the definition line) by also
//! grabbing the contiguous `///`/`//!`/`#`/`"""` block immediately above
//! it. Grounded in the teacher pack's `sven-tools` `ReadFileTool` for the
//! line-windowed read shape.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

pub struct DocContextTool;

#[async_trait]
impl Tool for DocContextTool {
    fn name(&self) -> &str {
        "doc_context"
    }

    fn description(&self) -> &str {
        "Reads the doc comment (if any) immediately preceding a given line in a file,\n\
         along with the line itself. Use after symbol_nav to pull a definition's\n\
         documentation without reading the whole file."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "file_path": {"type": "string", "description": "Path to the file"},
            "line": {"type": "integer", "description": "1-indexed line number of the definition"}
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
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'file_path'".to_string()))?;
        let line = params
            .get("line")
            .and_then(Value::as_u64)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'line'".to_string()))?
            as usize;

        debug!(path, line, "doc_context");

        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(format!("read error: {e}"))),
        };
        let lines: Vec<&str> = content.lines().collect();
        if line == 0 || line > lines.len() {
            return Ok(ToolResult::error(format!("line {line} is out of range (file has {} lines)", lines.len())));
        }

        let doc_start = scan_doc_block_start(&lines, line - 1);
        let mut output = String::new();
        for l in &lines[doc_start..line] {
            output.push_str(l);
            output.push('\n');
        }

        Ok(ToolResult::ok(output.trim_end().to_string()))
    }
}

/// Walks upward from `def_index` while lines look like doc-comment or
/// attribute lines, returning the first line of the contiguous block.
fn scan_doc_block_start(lines: &[&str], def_index: usize) -> usize {
    let mut start = def_index;
    while start > 0 {
        let candidate = lines[start - 1].trim_start();
        if is_doc_like(candidate) {
            start -= 1;
        } else {
            break;
        }
    }
    start
}

fn is_doc_like(line: &str) -> bool {
    line.starts_with("///")
        || line.starts_with("//!")
        || line.starts_with('#')
        || line.starts_with("\"\"\"")
        || line.starts_with("* ")
        || line.starts_with("/**")
        || line.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pulls_preceding_doc_comment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        tokio::fs::write(&path, "/// Computes a thing.\n/// Returns the result.\npub fn compute() {}\n")
            .await
            .unwrap();
        let tool = DocContextTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"file_path": path.to_str().unwrap(), "line": 3}))
            .await
            .unwrap();
        assert!(result.content.contains("Computes a thing"));
        assert!(result.content.contains("pub fn compute"));
    }

    #[tokio::test]
    async fn no_doc_comment_returns_just_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        tokio::fs::write(&path, "let x = 1;\npub fn compute() {}\n").await.unwrap();
        let tool = DocContextTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"file_path": path.to_str().unwrap(), "line": 2}))
            .await
            .unwrap();
        assert_eq!(result.content, "pub fn compute() {}");
    }

    #[tokio::test]
    async fn out_of_range_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        tokio::fs::write(&path, "one line\n").await.unwrap();
        let tool = DocContextTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"file_path": path.to_str().unwrap(), "line": 99}))
            .await
            .unwrap();
        assert!(result.is_error);
    }
}
