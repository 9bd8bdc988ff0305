//! Mcp
//!
//! Domain types for the MCP connection manager (§4.7): per-server config,
//! transport, and connection lifecycle. Generalises the teacher's
//! `ToolServerStatus` (`domain/mcp.rs`) from "one capability maps to one
//! server" into the spec's richer lazy-connect/LRU/cooldown lifecycle.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CONNECTIONS: usize = 2;
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_COOLDOWN_BASE: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    Stdio,
    StreamableHttp,
    Sse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    /// `None` for a URL-configured server means "auto-detect": try
    /// streamable HTTP first, fall back to SSE.
    pub transport: Option<ServerTransport>,
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub url: Option<String>,
}

/// `ToolServerStatus`, extended with `Failed{cooldown_until}` to express
/// the failure-cooldown policy (teacher precedent: `Unhealthy`/`Failed`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Disconnected,
    Connecting,
    Connected { transport: ServerTransport },
    Failed { cooldown_until: DateTime<Utc> },
}

/// Consecutive-failure cooldown growth: `min(fail_count,3) * base`.
pub fn cooldown_duration(fail_count: u32, base: Duration) -> Duration {
    base * fail_count.min(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_caps_growth_at_three_failures() {
        assert_eq!(cooldown_duration(1, DEFAULT_COOLDOWN_BASE), Duration::from_secs(20));
        assert_eq!(cooldown_duration(2, DEFAULT_COOLDOWN_BASE), Duration::from_secs(40));
        assert_eq!(cooldown_duration(3, DEFAULT_COOLDOWN_BASE), Duration::from_secs(60));
        assert_eq!(cooldown_duration(10, DEFAULT_COOLDOWN_BASE), Duration::from_secs(60));
    }
}
