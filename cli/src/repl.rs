// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wires every engine collaborator (registries, permission policy, hook
//! manager, executor, provider, sub-agent env) into a runnable session and
//! drives the REPL: read a line, run a turn, repeat, handling a small set
//! of meta-commands (`/exit`, `/trust reset`) before handing a line to the
//! agent loop as a user turn.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use apexion_core::application::agent_loop::{new_turn_token, user_message};
use apexion_core::application::subagent::{SubAgentEnv, TaskTool};
use apexion_core::application::{AgentLoop, Executor};
use apexion_core::domain::config::AppConfig;
use apexion_core::domain::file_tracker::FileChangeTracker;
use apexion_core::domain::hook::HookManager;
use apexion_core::domain::io::Io;
use apexion_core::domain::message::Message;
use apexion_core::domain::permission::PermissionPolicy;
use apexion_core::domain::tool::ToolRegistry;
use apexion_core::infrastructure::llm::registry::ProviderRegistry;
use apexion_core::infrastructure::mcp_manager::{self, McpManager};

const SYSTEM_PROMPT: &str = "You are an interactive coding agent operating in the user's current \
working directory. You can read/write files, run shell commands, inspect git state, and search the \
web. Use tools deliberately, explain destructive actions before taking them, and keep responses concise.";

/// Everything needed to run one session: the registries, the executor,
/// the provider, and the IO port. Built once at startup, then driven by
/// [`run`] turn after turn.
pub struct Session {
    pub agent_loop: AgentLoop,
    pub io: Arc<dyn Io>,
    pub policy: Arc<PermissionPolicy>,
}

/// Builds the `ReadOnly`, `Code`, and `Default` registries, the hook
/// manager (project then global `.apexion/hooks.yaml`), the permission
/// policy, the provider registry, the MCP proxy tools, and the `task`
/// tool's sub-agent environment, then assembles the top-level
/// [`AgentLoop`] (§4.1-§4.7).
pub async fn build_session(config: AppConfig, io: Arc<dyn Io>) -> anyhow::Result<Session> {
    let read_only_registry = ToolRegistry::new();
    crate::tools::register_readonly_tools(&read_only_registry);

    let code_registry = ToolRegistry::new();
    crate::tools::register_code_tools(&code_registry);

    let default_registry = ToolRegistry::new();
    crate::tools::register_code_tools(&default_registry);
    crate::tools::register_default_extra_tools(&default_registry, io.clone(), &config.web, &config.repo_map);

    let policy = Arc::new(PermissionPolicy::new(config.permissions.clone()));
    let hooks = load_hooks();
    let tracker = Arc::new(FileChangeTracker::new());
    let provider = build_provider(&config)?;

    let sub_agent_env = Arc::new(SubAgentEnv {
        provider: provider.clone(),
        explore_registry: read_only_registry,
        code_registry: code_registry.clone(),
        parent_policy: policy.clone(),
        parent_io: io.clone(),
        hooks: hooks.clone(),
        tracker: tracker.clone(),
        lint: config.lint.clone(),
        test: config.test.clone(),
        auto_commit: config.auto_commit,
    });

    let io_for_progress = io.clone();
    let progress = Arc::new(move |update: apexion_core::application::SubAgentProgress| {
        let verb = if update.done { "done" } else { "running" };
        io_for_progress.system_message(&format!("└ {} {} ({} calls, {})", update.task_id, update.tool_name, update.tool_count, verb));
    });
    default_registry.register(Arc::new(TaskTool::new(sub_agent_env, progress)));

    if !config.mcp_servers.is_empty() {
        let server_names: Vec<String> = config.mcp_servers.iter().map(|s| s.name.clone()).collect();
        let manager = Arc::new(McpManager::new(config.mcp_servers.clone()));
        mcp_manager::register_tools(manager, &server_names, &default_registry).await;
    }

    let executor = Arc::new(Executor::new(
        default_registry.clone(),
        policy.clone(),
        hooks,
        tracker,
        io.clone(),
        config.lint.clone(),
        config.test.clone(),
        config.auto_commit,
    ));

    let agent_loop = AgentLoop::new(provider, default_registry, executor, io.clone(), SYSTEM_PROMPT, config.max_iterations);

    Ok(Session { agent_loop, io, policy })
}

fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn apexion_core::domain::llm::Provider>> {
    let registry = ProviderRegistry::from_config(config)?;
    Ok(Arc::new(registry))
}

/// Project hooks (`.apexion/hooks.yaml`) take precedence over global ones
/// (`~/.config/apexion/hooks.yaml`); either file is optional.
fn load_hooks() -> HookManager {
    let project = std::fs::read_to_string(".apexion/hooks.yaml").ok();
    let global = dirs::config_dir()
        .map(|d| d.join("apexion").join("hooks.yaml"))
        .and_then(|p| std::fs::read_to_string(p).ok());
    HookManager::load(project.as_deref(), global.as_deref())
}

/// Drives the REPL: prompt, read a line, run it as a turn, repeat until
/// `/exit`/`/quit` or EOF. `/trust reset` clears learned session
/// approvals (§4.2's "a reset operation empties the set").
pub async fn run(session: Session) {
    info!("apexion session starting");
    let mut transcript: Vec<Message> = Vec::new();

    loop {
        let Some(line) = session.io.read_input().await else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed {
            "/exit" | "/quit" => break,
            "/trust reset" => {
                session.policy.approvals().reset();
                session.io.system_message("session approvals cleared");
                continue;
            }
            _ => {}
        }

        transcript.push(user_message(trimmed.to_string()));
        let turn_token: CancellationToken = new_turn_token();
        let outcome = session.agent_loop.run_turn(&mut transcript, turn_token).await;
        if matches!(outcome, apexion_core::application::LoopOutcome::MaxIterationsReached) {
            warn!("turn ended at max_iterations");
        }
    }

    info!("apexion session ending");
}

/// Single-shot `--print` mode: runs exactly one turn over `prompt` and
/// returns once the model stops or the iteration cap is hit, without
/// entering the interactive REPL loop.
pub async fn run_once(session: Session, prompt: String) {
    let mut transcript = vec![user_message(prompt)];
    let turn_token = new_turn_token();
    session.agent_loop.run_turn(&mut transcript, turn_token).await;
}
