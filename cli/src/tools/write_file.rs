// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `write_file` — overwrite-or-append file write. Grounded in the teacher
//! pack's `sven-tools` `WriteTool` (create parent dirs, append flag).

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes a file, overwriting it if it already exists. Prefer edit_file for\n\
         targeted changes to existing files. Never write new files unless explicitly\n\
         required, and never proactively create documentation files. Creates parent\n\
         directories automatically. Set append=true to append instead of overwriting."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "file_path": {"type": "string", "description": "Absolute or relative path to the file"},
            "content": {"type": "string", "description": "Content to write"},
            "append": {"type": "boolean", "description": "Append instead of overwrite (default false)"}
        })
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Write
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let path = params
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'file_path'".to_string()))?;
        let content = params
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'content'".to_string()))?;
        let append = params.get("append").and_then(Value::as_bool).unwrap_or(false);

        debug!(path, append, "write_file");

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
        }

        if append {
            let opened = tokio::fs::OpenOptions::new().append(true).create(true).open(path).await;
            match opened {
                Ok(mut file) => {
                    let result = file.write_all(content.as_bytes()).await;
                    let _ = file.flush().await;
                    match result {
                        Ok(()) => Ok(ToolResult::ok(format!("appended {} bytes to {path}", content.len()))),
                        Err(e) => Ok(ToolResult::error(format!("write error: {e}"))),
                    }
                }
                Err(e) => Ok(ToolResult::error(format!("open error: {e}"))),
            }
        } else {
            match tokio::fs::write(path, content.as_bytes()).await {
                Ok(()) => Ok(ToolResult::ok(format!("wrote {} bytes to {path}", content.len()))),
                Err(e) => Ok(ToolResult::error(format!("write error: {e}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        let tool = WriteFileTool;
        let result = tool
            .execute(
                CancellationToken::new(),
                json!({"file_path": path.to_str().unwrap(), "content": "hello"}),
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn append_adds_to_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let tool = WriteFileTool;
        tool.execute(CancellationToken::new(), json!({"file_path": path.to_str().unwrap(), "content": "a"}))
            .await
            .unwrap();
        tool.execute(
            CancellationToken::new(),
            json!({"file_path": path.to_str().unwrap(), "content": "b", "append": true}),
        )
        .await
        .unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn missing_content_is_invalid_params() {
        let tool = WriteFileTool;
        let err = tool
            .execute(CancellationToken::new(), json!({"file_path": "/tmp/x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
