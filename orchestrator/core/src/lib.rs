// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # apexion-core
//!
//! The agent execution engine: the turn/iteration loop, the tool executor,
//! the permission policy, and the MCP connection manager that together
//! drive an interactive coding agent's tool-calling model session.
//!
//! ## Layer structure
//!
//! ```text
//! application/    ← agent loop, sub-agent orchestration, tool executor
//!     ↓
//! domain/         ← Tool/Message/Permission/Hook/Config value objects, ports
//!     ↓
//! infrastructure/ ← LLM provider adapters, MCP manager, hook subprocess runner
//! ```
//!
//! `domain` defines the ports (`Provider`, `Io`, `Tool`); `infrastructure`
//! adapts the provider and MCP ports. Built-in tool bodies and the `Io`
//! renderers are adapters too, but they live in the `cli` crate since they're
//! specific to the terminal front-end rather than the engine itself.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::message::{ContentBlock, Message, Role, ToolCallId};
pub use domain::tool::{PermissionLevel, RegistryPreset, Tool, ToolRegistry, ToolResult};
