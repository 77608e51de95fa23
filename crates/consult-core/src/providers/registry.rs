//! Provider registry — provider id to adapter

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{debug, info};

use super::http::build_client;
use super::types::{CompletionProvider, ProviderKind};
use super::{AnthropicProvider, GoogleProvider, OpenAiCompatProvider};
use crate::config::{ConfigError, ConsultConfig};

/// Adapters keyed by provider id, read-only once built
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &ids)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one adapter per enabled provider, each with its own timeout
    pub fn from_config(config: &ConsultConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::new();

        for provider in &config.providers {
            let client =
                build_client(provider.timeout).map_err(|e| ConfigError::HttpClient {
                    provider: provider.id.clone(),
                    reason: e.to_string(),
                })?;

            let adapter: Arc<dyn CompletionProvider> = match provider.kind {
                ProviderKind::OpenaiCompatible => {
                    Arc::new(OpenAiCompatProvider::new(provider.clone(), client))
                }
                ProviderKind::Anthropic => {
                    Arc::new(AnthropicProvider::new(provider.clone(), client))
                }
                ProviderKind::Google => Arc::new(GoogleProvider::new(provider.clone(), client)),
            };

            debug!(provider = %provider.id, kind = %provider.kind, "Registered provider");
            registry
                .register_shared(adapter)
                .map_err(|e| ConfigError::provider(&provider.id, e.to_string()))?;
        }

        info!("Provider registry ready ({} providers)", registry.len());
        Ok(registry)
    }

    pub fn register(&mut self, provider: impl CompletionProvider + 'static) -> Result<()> {
        self.register_shared(Arc::new(provider))
    }

    pub fn register_shared(&mut self, provider: Arc<dyn CompletionProvider>) -> Result<()> {
        let id = provider.provider_id().to_string();
        if id.is_empty() {
            bail!("provider id must not be empty");
        }
        if self.providers.contains_key(&id) {
            bail!("provider '{}' is already registered", id);
        }
        self.providers.insert(id, provider);
        Ok(())
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn CompletionProvider>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
