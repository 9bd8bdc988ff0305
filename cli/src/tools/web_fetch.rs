// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `web_fetch` — fetch a URL and return readable text. Grounded in the
//! teacher pack's `sven-tools` `WebFetchTool` (content-type branching,
//! char cap), but HTML is reduced to text with a small regex-based tag
//! strip instead of the teacher's `html2text` dependency, which isn't part
//! of this workspace's dependency set.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

const DEFAULT_MAX_CHARS: usize = 50_000;

pub struct WebFetchTool;

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetches a URL (http/https only) and returns its content as readable text.\n\
         HTML is reduced to plain text, JSON is pretty-printed. Read-only — no auth,\n\
         no side effects. max_chars: default 50000. Does not resolve localhost or\n\
         private-network hosts."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "url": {"type": "string", "description": "The URL to fetch (http or https)"},
            "max_chars": {"type": "integer", "description": "Maximum characters to return (default 50000)"}
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let url = params
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'url'".to_string()))?
            .to_string();
        let max_chars = params.get("max_chars").and_then(Value::as_u64).unwrap_or(DEFAULT_MAX_CHARS as u64) as usize;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Ok(ToolResult::error("only http/https URLs are supported"));
        }
        if is_private_host(&url) {
            return Ok(ToolResult::error("localhost and private-network hosts are not fetchable"));
        }

        debug!(url, "web_fetch");

        match fetch_url(&url, max_chars).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) => Ok(ToolResult::error(format!("fetch error: {e}"))),
        }
    }
}

fn is_private_host(url: &str) -> bool {
    let host = url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .split(['/', ':'])
        .next()
        .unwrap_or("");
    host == "localhost"
        || host.starts_with("127.")
        || host.starts_with("10.")
        || host.starts_with("192.168.")
        || host == "0.0.0.0"
        || host == "::1"
}

async fn fetch_url(url: &str, max_chars: usize) -> Result<String, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent("apexion-agent/0.1")
        .build()?;

    let response = client.get(url).send().await?;
    let content_type =
        response.headers().get("content-type").and_then(|v| v.to_str().ok()).unwrap_or("").to_lowercase();

    let body = response.text().await?;

    let content = if content_type.contains("html") {
        html_to_text(&body)
    } else if content_type.contains("json") {
        match serde_json::from_str::<Value>(&body) {
            Ok(v) => serde_json::to_string_pretty(&v).unwrap_or(body),
            Err(_) => body,
        }
    } else {
        body
    };

    if content.chars().count() > max_chars {
        let truncated: String = content.chars().take(max_chars).collect();
        Ok(format!("{truncated}...[truncated at {max_chars} chars; total {} chars]", content.chars().count()))
    } else {
        Ok(content)
    }
}

/// Strips tags and collapses whitespace. Not a full HTML-to-markdown
/// conversion (see module doc) — good enough for prose extraction.
fn html_to_text(html: &str) -> String {
    let script_style = Regex::new(r"(?is)<(script|style)[^>]*>.*?</\1>").unwrap();
    let without_scripts = script_style.replace_all(html, "");
    let tag = Regex::new(r"(?s)<[^>]+>").unwrap();
    let text = tag.replace_all(&without_scripts, " ");
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let whitespace = Regex::new(r"[ \t]+").unwrap();
    let collapsed = whitespace.replace_all(&decoded, " ");
    let blank_lines = Regex::new(r"\n{3,}").unwrap();
    blank_lines.replace_all(collapsed.trim(), "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_strips_tags() {
        let html = "<html><body><h1>Hello</h1><p>World</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("<h1>"));
    }

    #[test]
    fn html_to_text_drops_scripts() {
        let html = "<p>Keep</p><script>evil();</script>";
        let text = html_to_text(html);
        assert!(text.contains("Keep"));
        assert!(!text.contains("evil"));
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let tool = WebFetchTool;
        let result = tool.execute(CancellationToken::new(), json!({"url": "ftp://example.com"})).await.unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn rejects_private_host() {
        let tool = WebFetchTool;
        let result = tool.execute(CancellationToken::new(), json!({"url": "http://127.0.0.1/secret"})).await.unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn missing_url_is_invalid_params() {
        let tool = WebFetchTool;
        let err = tool.execute(CancellationToken::new(), json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
