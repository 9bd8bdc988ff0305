// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `read_file` — line-numbered text reads with offset/pagination, binary
//! fallback, and base64 image data-urls. Grounded in the teacher pack's
//! `sven-tools` `ReadFileTool` (pagination notice, `L{n}:` prefix,
//! image/binary branches), adapted onto `apexion_core`'s `Tool` trait.

use std::path::Path;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};
use apexion_core::domain::message::ImageMediaType;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DEFAULT_LINE_LIMIT: usize = 200;
const MAX_BYTES: usize = 20_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a file. Default: 200 lines / 20 KB, whichever comes first.\n\
         Lines are formatted as L{n}:content (1-indexed) — strip the prefix before\n\
         feeding old content back into edit_file.\n\
         Images (png/jpg/gif/webp) are returned as a data URL.\n\
         Non-UTF8 files fall back to a lossy decode with a note.\n\
         When more lines exist, a pagination notice names the next offset.\n\
         Prefer grep to locate the relevant region before reading a whole file."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "file_path": {"type": "string", "description": "Absolute or relative path to the file"},
            "offset": {"type": "integer", "description": "1-indexed line number to start reading from (default 1)"},
            "limit": {"type": "integer", "description": "Maximum number of lines to return (default 200)"}
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
        let offset = params.get("offset").and_then(Value::as_u64).unwrap_or(1) as usize;
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(DEFAULT_LINE_LIMIT as u64) as usize;

        debug!(path, offset, limit, "read_file");

        let ext = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        if is_image_extension(&ext) {
            return read_image(path, &ext).await;
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::error(format!("read error: {e}"))),
        };

        if has_binary_content(&bytes) {
            return Ok(ToolResult::ok(format!(
                "note: {path} looks like a binary file ({} bytes); use a hex viewer or a dedicated tool instead",
                bytes.len()
            )));
        }

        let text = String::from_utf8_lossy(&bytes);
        let all_lines: Vec<&str> = text.lines().collect();
        let total = all_lines.len();
        let start = offset.saturating_sub(1);

        let mut selected = Vec::new();
        let mut byte_count = 0usize;
        let mut truncated_by_bytes = false;
        for (i, line) in all_lines.iter().enumerate().skip(start).take(limit) {
            let line_bytes = line.len() + 1;
            if byte_count + line_bytes > MAX_BYTES {
                truncated_by_bytes = true;
                break;
            }
            selected.push(format!("L{}:{}", i + 1, line));
            byte_count += line_bytes;
        }

        let last_shown = start + selected.len();
        let mut content = selected.join("\n");
        if last_shown < total {
            let reason = if truncated_by_bytes {
                format!("byte limit ({MAX_BYTES} B) reached")
            } else {
                format!("{} more lines", total - last_shown)
            };
            content.push_str(&format!(
                "\n...[{reason} — showing L{}-L{} of {total}; use offset={} to continue]",
                offset,
                offset + selected.len().saturating_sub(1),
                last_shown + 1
            ));
        }

        Ok(ToolResult::ok(content))
    }
}

fn is_image_extension(ext: &str) -> bool {
    matches!(ext, "png" | "jpg" | "jpeg" | "gif" | "webp")
}

async fn read_image(path: &str, ext: &str) -> Result<ToolResult, ToolError> {
    use base64::Engine;
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => return Ok(ToolResult::error(format!("read error: {e}"))),
    };
    let media_type = match ext {
        "png" => ImageMediaType::Png,
        "jpg" | "jpeg" => ImageMediaType::Jpeg,
        "gif" => ImageMediaType::Gif,
        _ => ImageMediaType::Webp,
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(ToolResult {
        content: format!("Image file: {path} ({} bytes)", bytes.len()),
        is_error: false,
        truncated: false,
        user_cancelled: false,
        image: Some((media_type, encoded)),
    })
}

/// Samples up to 4096 bytes: a null byte or a high proportion of
/// non-printable bytes indicates binary content.
fn has_binary_content(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(4096)];
    if sample.contains(&0) {
        return true;
    }
    let non_text = sample.iter().filter(|&&b| b < 0x09 || (b > 0x0d && b < 0x20)).count();
    sample.len() > 0 && non_text * 100 / sample.len() > 5
}
