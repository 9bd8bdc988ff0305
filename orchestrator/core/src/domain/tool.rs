//! Tool
//!
//! The uniform contract every built-in and MCP-proxy tool implements, plus
//! the registry that maps names to tools and produces the schema list sent
//! to the model.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Tool trait object + registry (component A/B).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// How dangerous a tool invocation is, used by the permission policy and by
/// the UI when rendering a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Read,
    Write,
    Execute,
    Dangerous,
}

/// Outcome of a single `Tool::execute` call. Distinguishing `user_cancelled`
/// from `is_error` matters: the agent loop treats a user cancellation as a
/// request to stop the whole iteration, while an ordinary error is just
/// fed back to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
    pub truncated: bool,
    pub user_cancelled: bool,
    pub image: Option<(crate::domain::message::ImageMediaType, String)>,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Default::default() }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: true, ..Default::default() }
    }

    pub fn cancelled() -> Self {
        Self { content: "[User cancelled]".to_string(), user_cancelled: true, ..Default::default() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    Execution(String),
}

/// Static descriptor + operational contract for one tool.
///
/// `is_read_only` tools are eligible for parallel dispatch in the agent
/// loop (§4.4); everything else runs serially.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON-schema `properties` map plus `required` list, embedded by the
    /// registry into the `{type:"object", properties:...}` wrapper sent to
    /// the model.
    fn parameter_schema(&self) -> Value;
    fn is_read_only(&self) -> bool;
    fn permission_level(&self) -> PermissionLevel;

    async fn execute(&self, cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError>;
}

/// One entry of the schema list handed to the model provider.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Registers tools by name. Backed by a `BTreeMap` (rather than a
/// `HashMap`) so `schemas()` is deterministically sorted without an
/// explicit sort step — required by T-Idempotent-Register's "schema
/// output is not corrupted" guarantee under repeated registration.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<BTreeMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Arc::new(RwLock::new(BTreeMap::new())) }
    }

    /// Registering the same name twice replaces the previous tool; the
    /// registry never ends up with duplicate or orphaned entries.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.write().insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) {
        self.tools.write().remove(name);
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .read()
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": tool.parameter_schema(),
                }),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Which built-in registry shape a sub-agent (or the top-level session)
/// should be constructed with (§4.1, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryPreset {
    /// All built-ins plus optional sub-agent/question wiring.
    Default,
    /// Strictly non-mutating tools. Used by `explore`/`plan` sub-agents.
    ReadOnly,
    /// Read + write + bash + git, no `task`, no `question`. Used by `code`
    /// sub-agents to prevent nesting and prompting.
    Code,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTool {
        name: &'static str,
        read_only: bool,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn parameter_schema(&self) -> Value {
            serde_json::json!({})
        }
        fn is_read_only(&self) -> bool {
            self.read_only
        }
        fn permission_level(&self) -> PermissionLevel {
            PermissionLevel::Read
        }
        async fn execute(&self, _cancel: CancellationToken, _params: Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("stub"))
        }
    }

    #[test]
    fn schemas_are_sorted_by_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool { name: "zebra", read_only: true }));
        registry.register(Arc::new(StubTool { name: "alpha", read_only: true }));
        let names: Vec<_> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zebra".to_string()]);
    }

    #[test]
    fn re_registering_a_name_replaces_it_without_duplicating() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool { name: "bash", read_only: false }));
        registry.register(Arc::new(StubTool { name: "bash", read_only: true }));
        assert_eq!(registry.schemas().len(), 1);
        assert!(registry.get("bash").unwrap().is_read_only());
    }
}
