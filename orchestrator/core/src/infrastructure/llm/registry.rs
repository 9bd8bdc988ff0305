// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provider registry — resolves the configured provider name to a concrete
//! adapter and retries `chat_stream` establishment with exponential
//! backoff. Generalises the teacher's alias-resolving `ProviderRegistry`
//! (model-alias -> provider) down to the spec's single active-provider
//! model (§6: one `provider:` name selects one entry in `providers:`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::config::AppConfig;
use crate::domain::llm::{ChunkStream, LLMError, Provider};
use crate::domain::message::Message;
use crate::domain::tool::ToolSchema;

use super::anthropic::AnthropicAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    active: String,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl ProviderRegistry {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let mut providers = HashMap::new();

        for (name, provider_config) in &config.providers {
            match Self::create_provider(name, provider_config) {
                Ok(provider) => {
                    providers.insert(name.clone(), provider);
                }
                Err(e) => warn!(provider = %name, error = %e, "failed to initialize provider"),
            }
        }

        if providers.is_empty() {
            warn!("no LLM providers configured");
        }

        Ok(Self { providers, active: config.provider.clone(), max_retries: 3, retry_delay_ms: 500 })
    }

    fn create_provider(name: &str, config: &crate::domain::config::ProviderConfig) -> anyhow::Result<Arc<dyn Provider>> {
        let api_key = Self::resolve_api_key(&config.api_key);
        let model = config.model.clone();

        let provider: Arc<dyn Provider> = match name {
            "anthropic" => Arc::new(AnthropicAdapter::new(api_key, model)),
            "ollama" => {
                let endpoint = config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string());
                Arc::new(OllamaAdapter::new(endpoint, model))
            }
            _ => {
                let endpoint = config
                    .base_url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("provider '{name}' requires a base_url"))?;
                Arc::new(OpenAIAdapter::new(endpoint, api_key, model))
            }
        };
        Ok(provider)
    }

    fn resolve_api_key(key: &Option<String>) -> String {
        match key {
            Some(k) if k.starts_with("env:") => {
                let var_name = k.strip_prefix("env:").unwrap();
                std::env::var(var_name).unwrap_or_default()
            }
            Some(k) => k.clone(),
            None => String::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn active(&self) -> Option<Arc<dyn Provider>> {
        self.get(&self.active)
    }

    /// Establish a stream against the active provider, retrying connection
    /// setup with exponential backoff. Once bytes start flowing the caller
    /// owns retry/cancellation for the remainder of the turn.
    pub async fn chat_stream(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolSchema],
    ) -> Result<ChunkStream, LLMError> {
        let provider = self
            .active()
            .ok_or_else(|| LLMError::Provider(format!("provider '{}' not configured", self.active)))?;

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            match provider.chat_stream(messages, system_prompt, tools).await {
                Ok(stream) => return Ok(stream),
                Err(LLMError::RateLimit) | Err(LLMError::Network(_)) => {
                    last_error = Some(LLMError::RateLimit);
                    warn!(attempt = attempt + 1, "provider unavailable, retrying");
                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        self.retry_delay_ms * 2_u64.pow(attempt),
                    ))
                    .await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| LLMError::Provider("exhausted retries".into())))
    }

    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let mut results = HashMap::new();
        for (name, provider) in &self.providers {
            info!(provider = %name, "health checking");
            results.insert(name.clone(), provider.health_check().await);
        }
        results
    }
}

/// Lets the registry stand in for a single `Arc<dyn Provider>` so the
/// agent loop can be handed the retry-wrapped active provider directly
/// instead of reaching past it to a raw adapter.
#[async_trait]
impl Provider for ProviderRegistry {
    fn default_model(&self) -> &str {
        self.active.as_str()
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolSchema],
    ) -> Result<ChunkStream, LLMError> {
        ProviderRegistry::chat_stream(self, messages, system_prompt, tools).await
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let provider = self
            .active()
            .ok_or_else(|| LLMError::Provider(format!("provider '{}' not configured", self.active)))?;
        provider.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ProviderConfig;

    #[test]
    fn from_config_resolves_active_provider() {
        let mut config = AppConfig::default();
        config.provider = "anthropic".to_string();
        config.providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                api_key: Some("test-key".to_string()),
                base_url: None,
                model: "claude-sonnet-4".to_string(),
                image_input: true,
                image_models_allow: vec![],
                image_models_deny: vec![],
            },
        );
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.active().is_some());
        assert_eq!(registry.active().unwrap().default_model(), "claude-sonnet-4");
    }

    #[test]
    fn unknown_active_provider_yields_none() {
        let config = AppConfig::default();
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.active().is_none());
    }
}
