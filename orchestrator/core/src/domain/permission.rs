//! Permission
//!
//! The multi-tier decision engine (§4.2): mode, per-tool allow/deny,
//! command allow/deny with shell-safe prefix matching, path allow-lists,
//! and session-scoped learned approvals.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** `PermissionPolicy::decide`, grounded in the teacher's
//!   `SecurityContext::evaluate` (deny-list-first, then capability match)
//!   and `ToolPolicy::validate_invocation`'s allow/deny/path cascade.

use std::collections::HashSet;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path_sanitizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Interactive,
    AutoApprove,
    Yolo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
    NeedConfirmation,
}

/// Immutable for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    pub mode: PermissionMode,
    #[serde(default)]
    pub auto_approve_tools: HashSet<String>,
    #[serde(default)]
    pub allowed_commands: Vec<String>,
    #[serde(default)]
    pub denied_commands: Vec<String>,
    #[serde(default)]
    pub allowed_paths: Vec<String>,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            mode: PermissionMode::Interactive,
            auto_approve_tools: HashSet::new(),
            allowed_commands: Vec::new(),
            denied_commands: Vec::new(),
            allowed_paths: Vec::new(),
        }
    }
}

/// Canonicalised `(tool, principal-argument)` pair used for session-scoped
/// learned approvals (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApprovalKey(pub String);

impl ApprovalKey {
    pub fn derive(tool_name: &str, params: &Value) -> Self {
        match tool_name {
            "bash" => {
                let command = params.get("command").and_then(Value::as_str).unwrap_or("");
                let first_token = command.split_whitespace().next().unwrap_or("");
                ApprovalKey(format!("bash:{first_token}"))
            }
            "edit_file" | "write_file" => {
                let path = params.get("file_path").and_then(Value::as_str).unwrap_or("");
                let cleaned = path_sanitizer::clean_path(path);
                ApprovalKey(format!("{tool_name}:{}", cleaned.display()))
            }
            other => ApprovalKey(other.to_string()),
        }
    }
}

/// Mutable set learned during the session. Process-memory only — never
/// persisted (§9 design note).
#[derive(Default)]
pub struct SessionApprovals {
    approved: Mutex<HashSet<ApprovalKey>>,
}

impl SessionApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &ApprovalKey) -> bool {
        self.approved.lock().contains(key)
    }

    pub fn learn(&self, key: ApprovalKey) {
        self.approved.lock().insert(key);
    }

    /// `/trust reset` REPL command.
    pub fn reset(&self) {
        self.approved.lock().clear();
    }
}

/// Characters whose presence anywhere in a `bash` command forces
/// `NeedConfirmation` even when the command's leading token matches an
/// allow-list entry (shell-injection guard, T-ShellSafety).
const SHELL_INJECTION_CHARS: &[&str] = &[";", "&", "|", "`", "$(", ">", "<"];

fn contains_shell_injection(command: &str) -> bool {
    SHELL_INJECTION_CHARS.iter().any(|token| command.contains(token))
}

/// A command is matched by an allow-list entry only if the command string
/// equals the entry, or continues with ASCII whitespace right after it —
/// `"git status"` matches `"git"`, `"gitfoo"` does not.
fn shell_safe_prefix_match(command: &str, prefix: &str) -> bool {
    if command == prefix {
        return true;
    }
    command
        .strip_prefix(prefix)
        .map(|rest| rest.starts_with(|c: char| c.is_ascii_whitespace()))
        .unwrap_or(false)
}

pub struct PermissionPolicy {
    config: PermissionConfig,
    approvals: SessionApprovals,
}

impl PermissionPolicy {
    pub fn new(config: PermissionConfig) -> Self {
        Self { config, approvals: SessionApprovals::new() }
    }

    pub fn approvals(&self) -> &SessionApprovals {
        &self.approvals
    }

    pub fn mode(&self) -> PermissionMode {
        self.config.mode
    }

    /// §4.2's five-tier algorithm, in strict order.
    pub fn decide(&self, tool_name: &str, is_read_only: bool, params: &Value) -> Decision {
        let _ = is_read_only;

        // 1. Denied substrings override everything, including yolo.
        if tool_name == "bash" {
            let command = params.get("command").and_then(Value::as_str).unwrap_or("");
            if self.config.denied_commands.iter().any(|denied| command.contains(denied.as_str())) {
                return Decision::Deny(format!("command matches a denied pattern: {command}"));
            }
        }

        // 2. Path allow-list for edit_file/write_file.
        if matches!(tool_name, "edit_file" | "write_file") && !self.config.allowed_paths.is_empty() {
            let path = params.get("file_path").and_then(Value::as_str).unwrap_or("");
            if !path_sanitizer::path_allowed(path, &self.config.allowed_paths) {
                return Decision::Deny(format!("path outside allowed locations: {path}"));
            }
        }

        // 3. Explicit per-tool auto-approve.
        if self.config.auto_approve_tools.contains(tool_name) {
            return Decision::Allow;
        }

        // 4. Command allow-list with shell-safe prefix matching.
        if tool_name == "bash" {
            let command = params.get("command").and_then(Value::as_str).unwrap_or("");
            let prefix_matches = self
                .config
                .allowed_commands
                .iter()
                .any(|allowed| shell_safe_prefix_match(command, allowed));
            if prefix_matches {
                if contains_shell_injection(command) {
                    return Decision::NeedConfirmation;
                }
                return Decision::Allow;
            }
        }

        // 5. Mode fallback.
        match self.config.mode {
            PermissionMode::Yolo => Decision::Allow,
            PermissionMode::AutoApprove => {
                if tool_name == "bash" {
                    Decision::NeedConfirmation
                } else {
                    Decision::Allow
                }
            }
            PermissionMode::Interactive => {
                let key = ApprovalKey::derive(tool_name, params);
                if self.approvals.contains(&key) {
                    Decision::Allow
                } else {
                    Decision::NeedConfirmation
                }
            }
        }
    }

    /// Called by the executor after a user approves a `NeedConfirmation`
    /// decision, so later matching calls auto-approve.
    pub fn learn_approval(&self, tool_name: &str, params: &Value) {
        self.approvals.learn(ApprovalKey::derive(tool_name, params));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(mode: PermissionMode) -> PermissionPolicy {
        PermissionPolicy::new(PermissionConfig { mode, ..Default::default() })
    }

    #[test]
    fn denied_command_beats_yolo() {
        let mut config = PermissionConfig { mode: PermissionMode::Yolo, ..Default::default() };
        config.denied_commands.push("rm -rf /".to_string());
        let p = PermissionPolicy::new(config);
        let decision = p.decide("bash", false, &serde_json::json!({"command": "rm -rf / --no-preserve-root"}));
        assert!(matches!(decision, Decision::Deny(_)));
    }

    #[test]
    fn denied_path_beats_yolo() {
        let config = PermissionConfig {
            mode: PermissionMode::Yolo,
            allowed_paths: vec!["./src/**".to_string()],
            ..Default::default()
        };
        let p = PermissionPolicy::new(config);
        let decision = p.decide(
            "edit_file",
            false,
            &serde_json::json!({"file_path": "./src/../../../etc/passwd"}),
        );
        assert!(matches!(decision, Decision::Deny(_)));
    }

    #[test]
    fn shell_injection_forces_confirmation_even_with_matching_prefix() {
        let config = PermissionConfig {
            mode: PermissionMode::Interactive,
            allowed_commands: vec!["git".to_string()],
            ..Default::default()
        };
        let p = PermissionPolicy::new(config);
        assert_eq!(p.decide("bash", false, &serde_json::json!({"command": "git status"})), Decision::Allow);
        assert_eq!(
            p.decide("bash", false, &serde_json::json!({"command": "git; rm -rf /"})),
            Decision::NeedConfirmation
        );
        assert_eq!(
            p.decide("bash", false, &serde_json::json!({"command": "gitfoo"})),
            Decision::NeedConfirmation
        );
    }

    #[test]
    fn interactive_mode_learns_approvals() {
        let p = policy(PermissionMode::Interactive);
        let params = serde_json::json!({"command": "npm install"});
        assert_eq!(p.decide("bash", false, &params), Decision::NeedConfirmation);
        p.learn_approval("bash", &params);
        let params2 = serde_json::json!({"command": "npm run build"});
        assert_eq!(p.decide("bash", false, &params2), Decision::Allow);
        let params3 = serde_json::json!({"command": "pip install foo"});
        assert_eq!(p.decide("bash", false, &params3), Decision::NeedConfirmation);
    }

    #[test]
    fn auto_approve_mode_prompts_for_bash_without_allow_list_match() {
        let p = policy(PermissionMode::AutoApprove);
        assert_eq!(p.decide("read_file", true, &serde_json::json!({})), Decision::Allow);
        assert_eq!(
            p.decide("bash", false, &serde_json::json!({"command": "whoami"})),
            Decision::NeedConfirmation
        );
    }

    #[test]
    fn approval_key_derivation_matches_spec() {
        let key = ApprovalKey::derive("bash", &serde_json::json!({"command": "npm install foo"}));
        assert_eq!(key, ApprovalKey("bash:npm".to_string()));
        let key = ApprovalKey::derive("read_file", &serde_json::json!({"path": "a.rs"}));
        assert_eq!(key, ApprovalKey("read_file".to_string()));
    }

    #[test]
    fn trust_reset_clears_learned_approvals() {
        let p = policy(PermissionMode::Interactive);
        let params = serde_json::json!({"command": "npm install"});
        p.learn_approval("bash", &params);
        assert_eq!(p.decide("bash", false, &params), Decision::Allow);
        p.approvals().reset();
        assert_eq!(p.decide("bash", false, &params), Decision::NeedConfirmation);
    }
}
