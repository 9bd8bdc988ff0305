// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Built-in tool bodies for the `cli` front-end (see `README.md`: these
//! live here rather than in `apexion-core` because they're specific to a
//! terminal agent — file/shell/git/web/search access — not to the engine
//! itself, which only depends on the `Tool` trait).
//!
//! Registry composition mirrors the three presets named in the engine
//! (`RegistryPreset::{Default, ReadOnly, Code}`, §4.1): callers build the
//! `ReadOnly` and `Code` registries first (needed to construct a
//! `SubAgentEnv`), then build `Default` by cloning `Code`'s tools and
//! layering on `question`, `task`, the web tools, and the repo-navigation
//! tools that sub-agents never get.

pub mod bash;
pub mod doc_context;
pub mod edit_file;
pub mod git;
pub mod glob_tool;
pub mod grep_tool;
pub mod list_dir;
pub mod question;
pub mod read_file;
pub mod repo_map;
pub mod symbol_nav;
pub mod web_fetch;
pub mod web_search;
pub mod write_file;

use std::sync::Arc;

use apexion_core::domain::config::{RepoMapConfig, WebConfig};
use apexion_core::domain::io::Io;
use apexion_core::domain::tool::ToolRegistry;

use bash::BashTool;
use doc_context::DocContextTool;
use edit_file::EditFileTool;
use git::{GitDiffTool, GitLogTool, GitStatusTool};
use glob_tool::GlobTool;
use grep_tool::GrepTool;
use list_dir::ListDirTool;
use question::QuestionTool;
use read_file::ReadFileTool;
use repo_map::RepoMapTool;
use symbol_nav::SymbolNavTool;
use web_fetch::WebFetchTool;
use web_search::WebSearchTool;
use write_file::WriteFileTool;

/// Tools safe for the `ReadOnly` preset: no mutation, no shell, no
/// sub-agent/question nesting. Used by `explore`/`plan` sub-agents (§4.5).
pub fn register_readonly_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(ReadFileTool));
    registry.register(Arc::new(GrepTool));
    registry.register(Arc::new(ListDirTool));
    registry.register(Arc::new(GlobTool));
    registry.register(Arc::new(GitStatusTool));
    registry.register(Arc::new(GitDiffTool));
    registry.register(Arc::new(GitLogTool));
    registry.register(Arc::new(SymbolNavTool));
    registry.register(Arc::new(DocContextTool));
}

/// Adds the mutating/shell tools on top of `register_readonly_tools` to
/// build the `Code` preset: read + write + bash + git, no `task`, no
/// `question` (§4.1, §4.5).
pub fn register_code_tools(registry: &ToolRegistry) {
    register_readonly_tools(registry);
    registry.register(Arc::new(WriteFileTool));
    registry.register(Arc::new(EditFileTool));
    registry.register(Arc::new(BashTool));
}

/// Adds the tools that only ever appear in the top-level `Default`
/// registry: interactive `question`, and the network-facing web tools.
/// `task` is registered separately by the caller once a `SubAgentEnv`
/// exists (it needs the already-built `ReadOnly`/`Code` registries).
pub fn register_default_extra_tools(registry: &ToolRegistry, io: Arc<dyn Io>, web: &WebConfig, repo_map: &RepoMapConfig) {
    registry.register(Arc::new(QuestionTool::new(io)));
    registry.register(Arc::new(WebFetchTool));
    registry.register(Arc::new(WebSearchTool {
        provider: web.search_provider.clone(),
        api_key: web.search_api_key.clone(),
    }));
    registry.register(Arc::new(RepoMapTool::new(repo_map.clone())));
}
