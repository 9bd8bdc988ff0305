// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `web_search` — real-time web search. Grounded in the teacher pack's
//! `sven-tools` `WebSearchTool` (API-key resolution, result formatting),
//! re-pointed from the teacher's Brave Search integration to the
//! Tavily/Exa providers this workspace's config and env vars name
//! (`web.search_provider`/`web.search_api_key`, `TAVILY_API_KEY`,
//! `EXA_API_KEY`).

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

#[derive(Default)]
pub struct WebSearchTool {
    pub provider: Option<String>,
    pub api_key: Option<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Real-time web search via the configured provider (tavily or exa).\n\
         count: 1-10 (default 5). Include the current year in queries for recent\n\
         info. Cite sources after answering:\n\
         Sources:\n\
         - [Title](URL)"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "query": {"type": "string", "description": "Search query"},
            "count": {"type": "integer", "description": "Number of results to return (default 5, max 10)"}
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let query = params
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'query'".to_string()))?
            .to_string();
        let count = params.get("count").and_then(Value::as_u64).unwrap_or(5).min(10) as usize;

        let provider = self.provider.clone().unwrap_or_else(|| "tavily".to_string());
        debug!(query, count, provider, "web_search");

        let api_key = self.api_key.clone().or_else(|| resolve_env_key(&provider));
        let Some(api_key) = api_key else {
            return Ok(ToolResult::error(format!(
                "No API key configured for search provider '{provider}'. Set web.search_api_key \
                 in config or the {} environment variable.",
                env_var_name(&provider)
            )));
        };

        let result = match provider.as_str() {
            "exa" => exa_search(&query, count, &api_key).await,
            _ => tavily_search(&query, count, &api_key).await,
        };

        match result {
            Ok(results) => Ok(ToolResult::ok(results)),
            Err(e) => Ok(ToolResult::error(format!("search error: {e}"))),
        }
    }
}

fn env_var_name(provider: &str) -> &'static str {
    if provider == "exa" {
        "EXA_API_KEY"
    } else {
        "TAVILY_API_KEY"
    }
}

fn resolve_env_key(provider: &str) -> Option<String> {
    std::env::var(env_var_name(provider)).ok()
}

async fn tavily_search(query: &str, count: usize, api_key: &str) -> Result<String, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(std::time::Duration::from_secs(15)).build()?;

    let resp = client
        .post("https://api.tavily.com/search")
        .json(&json!({
            "api_key": api_key,
            "query": query,
            "max_results": count,
        }))
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        return Ok(format!("Tavily API returned status {status}"));
    }

    let body: Value = resp.json().await?;
    let results = body.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
    Ok(format_results(&results, "title", "url", "content", count))
}

async fn exa_search(query: &str, count: usize, api_key: &str) -> Result<String, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(std::time::Duration::from_secs(15)).build()?;

    let resp = client
        .post("https://api.exa.ai/search")
        .header("x-api-key", api_key)
        .json(&json!({
            "query": query,
            "numResults": count,
            "contents": {"text": true},
        }))
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        return Ok(format!("Exa API returned status {status}"));
    }

    let body: Value = resp.json().await?;
    let results = body.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
    Ok(format_results(&results, "title", "url", "text", count))
}

fn format_results(results: &[Value], title_key: &str, url_key: &str, body_key: &str, count: usize) -> String {
    if results.is_empty() {
        return "(no results)".to_string();
    }
    let mut output = Vec::new();
    for (i, r) in results.iter().enumerate().take(count) {
        let title = r.get(title_key).and_then(Value::as_str).unwrap_or("(no title)");
        let url = r.get(url_key).and_then(Value::as_str).unwrap_or("");
        let body = r.get(body_key).and_then(Value::as_str).unwrap_or("");
        let snippet: String = body.chars().take(280).collect();
        output.push(format!("{}. **{title}**\n   {url}\n   {snippet}", i + 1));
    }
    output.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_query_is_invalid_params() {
        let tool = WebSearchTool::default();
        let err = tool.execute(CancellationToken::new(), json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn missing_api_key_is_a_recoverable_error() {
        std::env::remove_var("TAVILY_API_KEY");
        let tool = WebSearchTool::default();
        let result = tool.execute(CancellationToken::new(), json!({"query": "rust async"})).await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("TAVILY_API_KEY"));
    }

    #[test]
    fn format_results_handles_empty() {
        assert_eq!(format_results(&[], "title", "url", "content", 5), "(no results)");
    }

    #[test]
    fn env_var_name_switches_on_provider() {
        assert_eq!(env_var_name("exa"), "EXA_API_KEY");
        assert_eq!(env_var_name("tavily"), "TAVILY_API_KEY");
    }
}
