//! Error
//!
//! Unified error type for the two boundaries that need exactly one error
//! type (config loading, CLI entry point) — see §7. Internal subsystems
//! keep their own typed errors (`ToolError`, `LLMError`, `PathSanitizerError`)
//! per the teacher's `PolicyError`/`LLMError`/`MCPError` precedent.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Llm(#[from] super::llm::LLMError),
    #[error("fatal: {0}")]
    FatalInit(String),
}
