// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: the agent loop (component G), the tool executor
//! (component F), and sub-agent orchestration (component H).

pub mod agent_loop;
pub mod executor;
pub mod subagent;

pub use agent_loop::{AgentLoop, LoopOutcome};
pub use executor::Executor;
pub use subagent::{SubAgent, SubAgentMode, SubAgentProgress};
