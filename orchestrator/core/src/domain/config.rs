//! Config
//!
//! `AppConfig`: the serde shape of `~/.config/apexion/config.yaml` (§6),
//! following the teacher's layered-default pattern in `NodeConfig`
//! (`domain/node_config.rs`) — every nested config implements `Default` so
//! a partially-specified YAML file still produces a usable configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::mcp::ServerConfig;
use super::permission::PermissionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    #[serde(default)]
    pub image_input: bool,
    #[serde(default)]
    pub image_models_allow: Vec<String>,
    #[serde(default)]
    pub image_models_deny: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebConfig {
    pub search_provider: Option<String>,
    pub search_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub work_dir: String,
    #[serde(default)]
    pub audit_log: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self { work_dir: ".".to_string(), audit_log: None }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub commands: HashMap<String, String>,
    #[serde(default = "default_max_fixes")]
    pub max_fixes: u32,
}

fn default_max_fixes() -> u32 {
    3
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub commands: HashMap<String, String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoMapConfig {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_repo_map_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_repo_map_tokens() -> u32 {
    2048
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub permissions: PermissionConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub auto_commit: bool,
    #[serde(default)]
    pub lint: LintConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub repo_map: RepoMapConfig,
    /// Remote MCP tool servers (§4.7). Absent or empty means no MCP
    /// proxies are registered for the session.
    #[serde(default)]
    pub mcp_servers: Vec<ServerConfig>,
}

fn default_max_iterations() -> u32 {
    0
}

fn default_context_window() -> u32 {
    128_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            providers: HashMap::new(),
            permissions: PermissionConfig::default(),
            web: WebConfig::default(),
            max_iterations: default_max_iterations(),
            context_window: default_context_window(),
            sandbox: SandboxConfig::default(),
            auto_commit: false,
            lint: LintConfig::default(),
            test: TestConfig::default(),
            repo_map: RepoMapConfig::default(),
            mcp_servers: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn active_provider(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_in_defaults() {
        let yaml = "provider: anthropic\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_iterations, 0);
        assert_eq!(config.context_window, 128_000);
        assert!(!config.auto_commit);
    }

    #[test]
    fn active_provider_resolves_by_name() {
        let yaml = r#"
provider: openai
providers:
  openai:
    model: gpt-4o
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.active_provider().unwrap().model, "gpt-4o");
    }
}
