// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `symbol_nav` — locate the definition site(s) of a named symbol across a
//! tree. Grounded in the teacher pack's `sven-tools` `GrepTool` (same
//! walk-and-regex shape), specialised to a fixed set of per-language
//! declaration patterns instead of a free-form user regex.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use apexion_core::domain::tool::{PermissionLevel, Tool, ToolError, ToolResult};

static EXCLUDED_DIRS: &[&str] = &[".git", "target", "node_modules", ".svn", "__pycache__", ".mypy_cache"];

fn is_excluded(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

pub struct SymbolNavTool;

#[async_trait]
impl Tool for SymbolNavTool {
    fn name(&self) -> &str {
        "symbol_nav"
    }

    fn description(&self) -> &str {
        "Finds where a symbol (function, type, class) is defined across the tree,\n\
         recognising fn/struct/enum/trait/impl (Rust), def/class (Python), \n\
         function/class (JS/TS), func/type (Go). Prefer over grep when you have an\n\
         exact identifier and want its definition, not every mention."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "symbol": {"type": "string", "description": "Exact identifier to locate"},
            "path": {"type": "string", "description": "Directory to search from (default: current directory)"},
            "limit": {"type": "integer", "description": "Maximum number of matches to return (default 20)"}
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn permission_level(&self) -> PermissionLevel {
        PermissionLevel::Read
    }

    async fn execute(&self, _cancel: CancellationToken, params: Value) -> Result<ToolResult, ToolError> {
        let symbol = params
            .get("symbol")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing required parameter 'symbol'".to_string()))?
            .to_string();
        let path = params.get("path").and_then(Value::as_str).unwrap_or(".").to_string();
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(20) as usize;

        debug!(symbol, path, "symbol_nav");

        let matches = tokio::task::spawn_blocking(move || find_definitions(&symbol, &path, limit))
            .await
            .map_err(|e| ToolError::Execution(format!("symbol_nav task panicked: {e}")))?;

        if matches.is_empty() {
            Ok(ToolResult::ok("(no definitions found)"))
        } else {
            Ok(ToolResult::ok(matches.join("\n")))
        }
    }
}

fn patterns_for(ext: &str, symbol: &str) -> Vec<Regex> {
    let s = regex::escape(symbol);
    let raw: &[&str] = match ext {
        "rs" => &[
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?fn\s+SYM\b",
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+SYM\b",
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+SYM\b",
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+SYM\b",
            r"^\s*impl(?:<[^>]*>)?\s+SYM\b",
        ],
        "py" => &[r"^\s*def\s+SYM\b", r"^\s*class\s+SYM\b"],
        "ts" | "tsx" | "js" | "jsx" => &[r"^\s*(?:export\s+)?function\s+SYM\b", r"^\s*(?:export\s+)?class\s+SYM\b"],
        "go" => &[r"^\s*func\s+(?:\([^)]*\)\s*)?SYM\b", r"^\s*type\s+SYM\b"],
        _ => &[],
    };
    raw.iter().map(|p| Regex::new(&p.replace("SYM", &s)).unwrap()).collect()
}

fn find_definitions(symbol: &str, base: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let walker = WalkDir::new(base)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_excluded(&e.file_name().to_string_lossy())));

    for entry in walker.flatten() {
        if out.len() >= limit {
            break;
        }
        if entry.file_type().is_dir() {
            continue;
        }
        let ext = entry.path().extension().and_then(|e| e.to_str()).unwrap_or("");
        let patterns = patterns_for(ext, symbol);
        if patterns.is_empty() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else { continue };
        for (i, line) in content.lines().enumerate() {
            if patterns.iter().any(|re| re.is_match(line)) {
                out.push(format!("{}:{}: {}", entry.path().display(), i + 1, line.trim()));
                if out.len() >= limit {
                    break;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_rust_fn_definition() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.rs"), "pub fn process_items() {}\nfn process_items_helper() {}\n")
            .await
            .unwrap();
        let tool = SymbolNavTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"symbol": "process_items", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert!(result.content.contains("process_items()"));
        assert!(!result.content.contains("process_items_helper"));
    }

    #[tokio::test]
    async fn no_match_reports_none_found() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SymbolNavTool;
        let result = tool
            .execute(CancellationToken::new(), json!({"symbol": "NoSuchThing", "path": dir.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(result.content, "(no definitions found)");
    }

    #[tokio::test]
    async fn missing_symbol_is_invalid_params() {
        let tool = SymbolNavTool;
        let err = tool.execute(CancellationToken::new(), json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
