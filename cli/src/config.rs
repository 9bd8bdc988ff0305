// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Layered config loading (§6): discover `~/.config/apexion/config.yaml`
//! (or an explicit `--config` path), merge in environment variable
//! overrides (highest priority), and hand back a ready-to-use `AppConfig`.
//!
//! Grounded in the teacher's `NodeConfig::load_or_default` layered-default
//! pattern (`domain/node_config.rs`): every nested config type implements
//! `Default`, so a missing or partial file still produces a usable
//! configuration, and discovery falls back through a fixed list of
//! candidate paths rather than failing outright.

use std::path::{Path, PathBuf};

use apexion_core::domain::config::AppConfig;
use apexion_core::domain::error::AgentError;

/// Candidate paths checked in order when no `--config` override is given.
fn discovery_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("./apexion.yaml"), PathBuf::from("./apexion-config.yaml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("apexion").join("config.yaml"));
    }
    paths.push(PathBuf::from("/etc/apexion/config.yaml"));
    paths
}

/// Loads config from (in priority order) an explicit path, `APEXION_CONFIG_PATH`,
/// or the first discovery candidate that exists. Falls back to
/// `AppConfig::default()` when nothing is found — a missing config file is
/// not a fatal error, only a missing/unreadable *explicit* one is.
pub fn load(explicit_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let path = explicit_path
        .or_else(|| std::env::var("APEXION_CONFIG_PATH").ok().map(PathBuf::from))
        .or_else(|| discovery_paths().into_iter().find(|p| p.exists()));

    let mut config = match path {
        Some(path) => load_file(&path)?,
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn load_file(path: &Path) -> Result<AppConfig, AgentError> {
    let contents = std::fs::read_to_string(path).map_err(AgentError::Io)?;
    serde_yaml::from_str(&contents).map_err(AgentError::Yaml)
}

/// Environment variables take priority over the file (§6). `LLM_*` and
/// `ANTHROPIC_API_KEY` configure the active provider's entry directly;
/// `APEXION_PROVIDER`/`APEXION_MODEL` can switch which provider is active
/// and retarget its model. Web search keys are provider-specific and
/// don't require an active `web.search_provider` to already be set.
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(provider) = std::env::var("APEXION_PROVIDER") {
        config.provider = provider;
    }

    let active_name = config.provider.clone();
    let entry = config.providers.entry(active_name).or_insert_with(|| apexion_core::domain::config::ProviderConfig {
        api_key: None,
        base_url: None,
        model: String::new(),
        image_input: false,
        image_models_allow: Vec::new(),
        image_models_deny: Vec::new(),
    });

    if let Ok(key) = std::env::var("LLM_API_KEY") {
        entry.api_key = Some(key);
    } else if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        if config.provider == "anthropic" {
            entry.api_key = Some(key);
        }
    }
    if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
        entry.base_url = Some(base_url);
    }
    if let Ok(model) = std::env::var("LLM_MODEL") {
        entry.model = model;
    }
    if let Ok(model) = std::env::var("APEXION_MODEL") {
        entry.model = model;
    }

    if let Ok(key) = std::env::var("TAVILY_API_KEY") {
        config.web.search_api_key = Some(key);
        if config.web.search_provider.is_none() {
            config.web.search_provider = Some("tavily".to_string());
        }
    }
    if let Ok(key) = std::env::var("EXA_API_KEY") {
        config.web.search_api_key = Some(key);
        if config.web.search_provider.is_none() {
            config.web.search_provider = Some("exa".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_path_is_an_error_not_a_silent_default() {
        let err = load_file(Path::new("/nonexistent/apexion-test-config.yaml"));
        assert!(err.is_err());
    }

    #[test]
    fn env_override_sets_active_provider_api_key() {
        std::env::set_var("LLM_API_KEY", "sk-test-123");
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.providers.get("anthropic").unwrap().api_key.as_deref(), Some("sk-test-123"));
        std::env::remove_var("LLM_API_KEY");
    }

    #[test]
    fn apexion_provider_env_switches_active_provider() {
        std::env::set_var("APEXION_PROVIDER", "openai");
        std::env::set_var("APEXION_MODEL", "gpt-4o");
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.provider, "openai");
        assert_eq!(config.providers.get("openai").unwrap().model, "gpt-4o");
        std::env::remove_var("APEXION_PROVIDER");
        std::env::remove_var("APEXION_MODEL");
    }
}
