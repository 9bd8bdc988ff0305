//! Hook
//!
//! YAML-configured pre/post-tool shell hooks (§4.6). Project config
//! overrides global config per event; an entry with an invalid regex is
//! dropped with a warning rather than failing the whole load, mirroring
//! the teacher's "continue with other servers" tolerance in
//! `ToolServerManager::start_all`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Hook config model (component D's static half; the
//!   subprocess runner lives in `infrastructure::hook_runner`).

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    PreTool,
    PostTool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawHookEntry {
    matcher: String,
    command: String,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawHookFile {
    #[serde(default)]
    hooks: RawHooks,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawHooks {
    #[serde(default)]
    pre_tool: Vec<RawHookEntry>,
    #[serde(default)]
    post_tool: Vec<RawHookEntry>,
}

/// One compiled hook rule.
#[derive(Debug, Clone)]
pub struct HookEntry {
    pub event: HookEvent,
    pub matcher: regex::Regex,
    pub command: String,
    pub timeout_s: u64,
}

impl HookEntry {
    pub fn matches(&self, tool_name: &str) -> bool {
        self.matcher.is_match(tool_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPayload {
    pub tool_name: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub tool_name: String,
    pub params: serde_json::Value,
    pub result: String,
    pub is_error: bool,
}

/// Loaded, compiled hook set for a session.
#[derive(Debug, Clone, Default)]
pub struct HookManager {
    entries: Vec<HookEntry>,
}

impl HookManager {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load project hooks then global hooks, project entries taking
    /// precedence per event (both sets are simply concatenated — the
    /// executor runs every matching hook, so "precedence" means the
    /// project's hooks for an event run before the global ones).
    pub fn load(project_yaml: Option<&str>, global_yaml: Option<&str>) -> Self {
        let mut entries = Vec::new();
        for yaml in [project_yaml, global_yaml].into_iter().flatten() {
            entries.extend(Self::compile_yaml(yaml));
        }
        Self { entries }
    }

    fn compile_yaml(yaml: &str) -> Vec<HookEntry> {
        let raw: RawHookFile = match serde_yaml::from_str(yaml) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to parse hooks.yaml, skipping: {e}");
                return Vec::new();
            }
        };
        let mut compiled = Vec::new();
        for (event, list) in [(HookEvent::PreTool, raw.hooks.pre_tool), (HookEvent::PostTool, raw.hooks.post_tool)] {
            for entry in list {
                match regex::Regex::new(&entry.matcher) {
                    Ok(matcher) => compiled.push(HookEntry {
                        event,
                        matcher,
                        command: entry.command,
                        timeout_s: entry.timeout,
                    }),
                    Err(e) => warn!("invalid hook matcher regex {:?}, dropping entry: {e}", entry.matcher),
                }
            }
        }
        compiled
    }

    pub fn matching(&self, event: HookEvent, tool_name: &str) -> Vec<&HookEntry> {
        self.entries.iter().filter(|e| e.event == event && e.matches(tool_name)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_regex_is_dropped_not_fatal() {
        let yaml = r#"
hooks:
  pre_tool:
    - matcher: "["
      command: "echo bad"
    - matcher: "^bash$"
      command: "echo ok"
      timeout: 5
"#;
        let mgr = HookManager::load(Some(yaml), None);
        assert_eq!(mgr.matching(HookEvent::PreTool, "bash").len(), 1);
    }

    #[test]
    fn project_and_global_hooks_both_run_project_first() {
        let project = r#"
hooks:
  post_tool:
    - matcher: ".*"
      command: "project-hook"
"#;
        let global = r#"
hooks:
  post_tool:
    - matcher: ".*"
      command: "global-hook"
"#;
        let mgr = HookManager::load(Some(project), Some(global));
        let matches = mgr.matching(HookEvent::PostTool, "write_file");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].command, "project-hook");
        assert_eq!(matches[1].command, "global-hook");
    }

    #[test]
    fn matcher_is_scoped_to_tool_name() {
        let yaml = r#"
hooks:
  pre_tool:
    - matcher: "^(write_file|edit_file)$"
      command: "echo fs"
"#;
        let mgr = HookManager::load(Some(yaml), None);
        assert_eq!(mgr.matching(HookEvent::PreTool, "write_file").len(), 1);
        assert_eq!(mgr.matching(HookEvent::PreTool, "bash").len(), 0);
    }
}
