// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! MCP connection manager (§4.7). Lazily connects to configured MCP
//! servers, auto-detects transport (streamable HTTP, falling back to SSE),
//! evicts the least-recently-used connection once `max_connections` is
//! reached, disconnects idle connections past their TTL, and backs off a
//! failing server for `min(fail_count,3) * cooldown_base`.
//!
//! Generalises the teacher's `ToolRouter`/`ToolServerStatus`
//! (`infrastructure/tool_router.rs`) connection-lifecycle bookkeeping from
//! "spawn one local process per capability" to "lazily dial a small pool
//! of remote servers under an LRU cap".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::mcp::{cooldown_duration, ServerConfig, ServerStatus, ServerTransport, DEFAULT_COOLDOWN_BASE, DEFAULT_IDLE_TTL, DEFAULT_MAX_CONNECTIONS};
use crate::domain::tool::{PermissionLevel, Tool, ToolError, ToolRegistry, ToolResult, ToolSchema};

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("server '{0}' is not configured")]
    UnknownServer(String),
    #[error("server '{0}' is cooling down after repeated failures")]
    Cooldown(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("tool '{0}' not found on server '{1}'")]
    ToolNotFound(String, String),
}

struct Connection {
    status: ServerStatus,
    last_used: Instant,
    fail_count: u32,
    tool_cache: Option<Vec<ToolSchema>>,
}

impl Connection {
    fn fresh() -> Self {
        Self { status: ServerStatus::Disconnected, last_used: Instant::now(), fail_count: 0, tool_cache: None }
    }
}

pub struct McpManager {
    configs: HashMap<String, ServerConfig>,
    connections: Mutex<HashMap<String, Connection>>,
    client: reqwest::Client,
    max_connections: usize,
    idle_ttl: Duration,
    cooldown_base: Duration,
}

impl McpManager {
    pub fn new(configs: Vec<ServerConfig>) -> Self {
        Self {
            configs: configs.into_iter().map(|c| (c.name.clone(), c)).collect(),
            connections: Mutex::new(HashMap::new()),
            client: reqwest::Client::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_ttl: DEFAULT_IDLE_TTL,
            cooldown_base: DEFAULT_COOLDOWN_BASE,
        }
    }

    /// Local proxy name exposed to the agent loop's tool registry.
    pub fn proxy_name(server: &str, tool: &str) -> String {
        format!("mcp__{server}__{tool}")
    }

    /// Splits `mcp__<server>__<tool>` back into its parts.
    pub fn split_proxy_name(proxy: &str) -> Option<(&str, &str)> {
        let rest = proxy.strip_prefix("mcp__")?;
        rest.split_once("__")
    }

    pub async fn list_tools(&self, server: &str) -> Result<Vec<ToolSchema>, McpError> {
        self.ensure_connected(server).await?;
        let cached = {
            let guard = self.connections.lock();
            guard.get(server).and_then(|c| c.tool_cache.clone())
        };
        if let Some(tools) = cached {
            return Ok(tools);
        }

        let config = self.configs.get(server).ok_or_else(|| McpError::UnknownServer(server.to_string()))?;
        let tools = self.fetch_tools(config).await.map_err(|e| {
            self.record_failure(server);
            e
        })?;

        let mut guard = self.connections.lock();
        if let Some(conn) = guard.get_mut(server) {
            conn.tool_cache = Some(tools.clone());
        }
        Ok(tools)
    }

    pub async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> Result<Value, McpError> {
        self.ensure_connected(server).await?;
        let config = self.configs.get(server).ok_or_else(|| McpError::UnknownServer(server.to_string()))?;

        match self.invoke_tool(config, tool, arguments.clone()).await {
            Ok(result) => {
                self.touch(server);
                Ok(result)
            }
            Err(first_err) => {
                // retry once after a forced reconnect, per the manager's
                // lazy-reconnect contract
                self.disconnect(server);
                self.ensure_connected(server).await?;
                match self.invoke_tool(config, tool, arguments).await {
                    Ok(result) => {
                        self.touch(server);
                        Ok(result)
                    }
                    Err(_) => {
                        self.record_failure(server);
                        Err(first_err)
                    }
                }
            }
        }
    }

    async fn ensure_connected(&self, server: &str) -> Result<(), McpError> {
        let config = self.configs.get(server).ok_or_else(|| McpError::UnknownServer(server.to_string()))?;

        {
            let mut guard = self.connections.lock();
            let conn = guard.entry(server.to_string()).or_insert_with(Connection::fresh);
            match &conn.status {
                ServerStatus::Connected { .. } => {
                    conn.last_used = Instant::now();
                    return Ok(());
                }
                ServerStatus::Failed { cooldown_until } if Utc::now() < *cooldown_until => {
                    return Err(McpError::Cooldown(server.to_string()));
                }
                _ => {}
            }
        }

        self.evict_lru_if_needed(server);

        let transport = self.detect_transport(config).await?;
        let mut guard = self.connections.lock();
        let conn = guard.entry(server.to_string()).or_insert_with(Connection::fresh);
        conn.status = ServerStatus::Connected { transport };
        conn.last_used = Instant::now();
        conn.fail_count = 0;
        info!(server, ?transport, "mcp server connected");
        Ok(())
    }

    async fn detect_transport(&self, config: &ServerConfig) -> Result<ServerTransport, McpError> {
        if let Some(transport) = config.transport {
            return Ok(transport);
        }
        let url = config.url.as_deref().ok_or_else(|| McpError::Transport("no url configured".into()))?;

        let probe = self.client.post(url).json(&serde_json::json!({"jsonrpc":"2.0","method":"ping","id":0})).send().await;
        match probe {
            Ok(resp) if resp.status().is_success() => Ok(ServerTransport::StreamableHttp),
            _ => Ok(ServerTransport::Sse),
        }
    }

    async fn fetch_tools(&self, config: &ServerConfig) -> Result<Vec<ToolSchema>, McpError> {
        let url = config.url.as_deref().ok_or_else(|| McpError::Transport("no url configured".into()))?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({"jsonrpc":"2.0","method":"tools/list","id":1}))
            .send()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        let body: Value = response.json().await.map_err(|e| McpError::Transport(e.to_string()))?;
        let tools = body
            .get("result")
            .and_then(|r| r.get("tools"))
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(tools
            .into_iter()
            .filter_map(|t| {
                Some(ToolSchema {
                    name: t.get("name")?.as_str()?.to_string(),
                    description: t.get("description").and_then(|d| d.as_str()).unwrap_or_default().to_string(),
                    input_schema: t.get("inputSchema").cloned().unwrap_or(Value::Null),
                })
            })
            .collect())
    }

    async fn invoke_tool(&self, config: &ServerConfig, tool: &str, arguments: Value) -> Result<Value, McpError> {
        let url = config.url.as_deref().ok_or_else(|| McpError::Transport("no url configured".into()))?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": "tools/call",
                "params": { "name": tool, "arguments": arguments },
                "id": 2,
            }))
            .send()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        let body: Value = response.json().await.map_err(|e| McpError::Transport(e.to_string()))?;
        body.get("result")
            .cloned()
            .ok_or_else(|| McpError::ToolNotFound(tool.to_string(), config.name.clone()))
    }

    fn touch(&self, server: &str) {
        if let Some(conn) = self.connections.lock().get_mut(server) {
            conn.last_used = Instant::now();
        }
    }

    fn disconnect(&self, server: &str) {
        if let Some(conn) = self.connections.lock().get_mut(server) {
            conn.status = ServerStatus::Disconnected;
            conn.tool_cache = None;
        }
    }

    fn record_failure(&self, server: &str) {
        let mut guard = self.connections.lock();
        let conn = guard.entry(server.to_string()).or_insert_with(Connection::fresh);
        conn.fail_count += 1;
        let cooldown = cooldown_duration(conn.fail_count, self.cooldown_base);
        conn.status = ServerStatus::Failed {
            cooldown_until: Utc::now() + chrono::Duration::from_std(cooldown).unwrap_or_default(),
        };
        warn!(server, fail_count = conn.fail_count, "mcp server marked failed");
    }

    /// Evicts the least-recently-used *other* connected server if adding
    /// one more would exceed the active-connection cap.
    fn evict_lru_if_needed(&self, incoming: &str) {
        let mut guard = self.connections.lock();
        let connected_count = guard
            .iter()
            .filter(|(name, c)| *name != incoming && matches!(c.status, ServerStatus::Connected { .. }))
            .count();
        if connected_count < self.max_connections {
            return;
        }
        if let Some(victim) = guard
            .iter()
            .filter(|(name, c)| *name != incoming && matches!(c.status, ServerStatus::Connected { .. }))
            .min_by_key(|(_, c)| c.last_used)
            .map(|(name, _)| name.clone())
        {
            if let Some(conn) = guard.get_mut(&victim) {
                conn.status = ServerStatus::Disconnected;
                conn.tool_cache = None;
                info!(server = %victim, "evicted mcp connection (LRU cap reached)");
            }
        }
    }

    /// Disconnects any connection idle past `idle_ttl`. Intended to be
    /// polled periodically by the application layer (e.g. once per turn).
    pub fn reap_idle(&self) {
        let mut guard = self.connections.lock();
        let idle_ttl = self.idle_ttl;
        for (name, conn) in guard.iter_mut() {
            if matches!(conn.status, ServerStatus::Connected { .. }) && conn.last_used.elapsed() > idle_ttl {
                conn.status = ServerStatus::Disconnected;
                conn.tool_cache = None;
                info!(server = %name, "disconnected idle mcp server");
            }
        }
    }
}

/// A remote MCP tool wrapped as a local `Tool` under the
/// `mcp__<server>__<tool>` naming convention (§6). Always treated as a
/// mutating, `Execute`-level tool: the manager has no way to know a given
/// remote tool's side effects, so the permission policy is asked every
/// time unless the server/tool pair has been explicitly allow-listed.
pub struct McpProxyTool {
    manager: Arc<McpManager>,
    server: String,
    tool: String,
    schema: ToolSchema,
}

#[async_trait]
impl Tool for McpProxyTool {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn description(&self) -> &str {
        &self.schema.description
    }

    fn parameter_schema(&self) -> Value {
        self.schema
            .input_schema
            .get("properties")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Execute
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        match self.manager.call_tool(&self.server, &self.tool, params).await {
            Ok(value) => Ok(ToolResult::ok(render_call_result(&value))),
            Err(e) => Err(ToolError::Execution(e.to_string())),
        }
    }
}

fn render_call_result(value: &Value) -> String {
    value
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| value.to_string())
}

/// Lists tools for every configured server and registers each as an
/// `mcp__<server>__<tool>` proxy in `registry`. A server that fails to
/// connect is logged and skipped — one unreachable MCP server never
/// prevents the rest of the session from starting.
pub async fn register_tools(manager: Arc<McpManager>, servers: &[String], registry: &ToolRegistry) {
    for server in servers {
        match manager.list_tools(server).await {
            Ok(schemas) => {
                for schema in schemas {
                    let proxy_name = McpManager::proxy_name(server, &schema.name);
                    let tool = McpProxyTool {
                        manager: manager.clone(),
                        server: server.clone(),
                        tool: schema.name.clone(),
                        schema: ToolSchema { name: proxy_name, description: schema.description, input_schema: schema.input_schema },
                    };
                    registry.register(Arc::new(tool));
                }
            }
            Err(e) => warn!(server, error = %e, "failed to register mcp server tools"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_name_round_trips() {
        let proxy = McpManager::proxy_name("github", "create_issue");
        assert_eq!(proxy, "mcp__github__create_issue");
        assert_eq!(McpManager::split_proxy_name(&proxy), Some(("github", "create_issue")));
    }

    #[test]
    fn split_proxy_name_rejects_non_proxy_names() {
        assert_eq!(McpManager::split_proxy_name("read_file"), None);
    }

    #[tokio::test]
    async fn unconfigured_server_is_rejected() {
        let manager = McpManager::new(vec![]);
        let err = manager.list_tools("ghost").await.unwrap_err();
        assert!(matches!(err, McpError::UnknownServer(_)));
    }
}
