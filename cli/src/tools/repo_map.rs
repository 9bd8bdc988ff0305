// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `repo_map` — a compact, token-budgeted overview of a repository: a
//! directory tree annotated with each source file's top-level symbols.
//! Grounded in the teacher pack's `sven-tools` `ListDirTool` for the walk
//! and exclusion list, extended with a regex symbol scan; budget and
//! exclusion knobs come from `AppConfig::repo_map` (`disabled`,
//! `max_tokens`, `exclude`).

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use apexion_core::domain::config::RepoMapConfig;
use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

static EXCLUDED_DIRS: &[&str] = &[".git", "target", "node_modules", ".svn", "__pycache__", ".mypy_cache"];

/// Chars-per-token heuristic used to approximate `max_tokens` without
/// depending on a real tokenizer.
const CHARS_PER_TOKEN: usize = 4;

pub struct RepoMapTool {
    config: RepoMapConfig,
}

impl RepoMapTool {
    pub fn new(config: RepoMapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for RepoMapTool {
    fn name(&self) -> &str {
        "repo_map"
    }

    fn description(&self) -> &str {
        "Produces a directory tree annotated with each source file's top-level\n\
         symbols (functions, types, traits/classes). Use to orient in an unfamiliar\n\
         repository before diving into individual files with read_file or grep."
    }

    fn parameter_schema(&self) -> Value {
        json!({"path": {"type": "string", "description": "Root directory to map (default: current directory)"}})
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        if self.config.disabled {
            return Ok(ToolResult::error("repo_map is disabled in configuration"));
        }
        let path = params.get("path").and_then(Value::as_str).unwrap_or(".").to_string();
        debug!(path, max_tokens = self.config.max_tokens, "repo_map");

        let exclude = self.config.exclude.clone();
        let max_chars = (self.config.max_tokens as usize).saturating_mul(CHARS_PER_TOKEN);

        let map = tokio::task::spawn_blocking(move || build_map(&path, &exclude))
            .await
            .map_err(|e| ToolError::Execution(format!("repo_map task panicked: {e}")))?;

        if map.chars().count() > max_chars {
            let truncated: String = map.chars().take(max_chars).collect();
            Ok(ToolResult {
                content: format!(
                    "{truncated}\n...[repo_map truncated at {max_chars} chars (repo_map.max_tokens={})]",
                    self.config.max_tokens
                ),
                is_error: false,
                truncated: true,
                user_cancelled: false,
                image: None,
            })
        } else {
            Ok(ToolResult::ok(map))
        }
    }
}

fn is_excluded(name: &str, extra: &[String]) -> bool {
    EXCLUDED_DIRS.contains(&name) || extra.iter().any(|e| e == name)
}

fn build_map(base: &str, exclude: &[String]) -> String {
    let mut out = String::new();
    let walker = WalkDir::new(base)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_excluded(&e.file_name().to_string_lossy(), exclude)));

    for entry in walker.flatten() {
        if entry.depth() == 0 || entry.file_type().is_dir() {
            continue;
        }
        let rel = entry.path().strip_prefix(base).unwrap_or(entry.path()).to_string_lossy().replace('\\', "/");
        let symbols = extract_symbols(entry.path());
        if symbols.is_empty() {
            out.push_str(&format!("{rel}\n"));
        } else {
            out.push_str(&format!("{rel}\n"));
            for s in symbols {
                out.push_str(&format!("  {s}\n"));
            }
        }
    }
    out
}

fn extract_symbols(path: &std::path::Path) -> Vec<String> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let patterns: &[(&str, &str)] = match ext {
        "rs" => &[
            (r"^\s*(?:pub(?:\([^)]*\))?\s+)?fn\s+(\w+)", "fn"),
            (r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)", "struct"),
            (r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+(\w+)", "enum"),
            (r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)", "trait"),
        ],
        "py" => &[(r"^\s*def\s+(\w+)", "def"), (r"^\s*class\s+(\w+)", "class")],
        "ts" | "tsx" | "js" | "jsx" => {
            &[(r"^\s*(?:export\s+)?function\s+(\w+)", "function"), (r"^\s*(?:export\s+)?class\s+(\w+)", "class")]
        }
        "go" => &[(r"^\s*func\s+(?:\([^)]*\)\s*)?(\w+)", "func"), (r"^\s*type\s+(\w+)", "type")],
        _ => return Vec::new(),
    };

    let Ok(content) = std::fs::read_to_string(path) else { return Vec::new() };
    let compiled: Vec<(Regex, &str)> = patterns.iter().map(|(p, k)| (Regex::new(p).unwrap(), *k)).collect();

    let mut symbols = Vec::new();
    for line in content.lines() {
        for (re, kind) in &compiled {
            if let Some(caps) = re.captures(line) {
                symbols.push(format!("{kind} {}", &caps[1]));
                break;
            }
        }
    }
    symbols
}
