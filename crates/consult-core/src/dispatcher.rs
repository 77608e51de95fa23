//! Dispatcher — fans one prompt out to many models and collects the answers

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::{Aggregator, ChatResponseBatch};
use crate::catalog::{ModelCatalog, split_model_id};
use crate::config::{ConfigError, ConsultConfig};
use crate::providers::{CompletionProvider, ProviderRegistry};

/// One consultation: a prompt and the addressable ids to ask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub prompt: String,
    pub models: Vec<String>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            models,
        }
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.prompt.trim().is_empty() {
            return Err(DispatchError::EmptyPrompt);
        }
        if self.models.is_empty() {
            return Err(DispatchError::NoModels);
        }
        Ok(())
    }
}

/// Request-level rejection; no provider is contacted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Please enter a prompt")]
    EmptyPrompt,
    #[error("Please select at least one model")]
    NoModels,
}

enum Route {
    Call {
        provider: Arc<dyn CompletionProvider>,
        model_key: String,
    },
    Malformed,
    UnknownProvider(String),
}

#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<ModelCatalog>,
    registry: Arc<ProviderRegistry>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("models", &self.catalog.len())
            .field("registry", &self.registry)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(catalog: Arc<ModelCatalog>, registry: Arc<ProviderRegistry>) -> Self {
        Self { catalog, registry }
    }

    /// Build the catalog and every adapter from a loaded configuration
    pub fn from_config(config: &ConsultConfig) -> Result<Self, ConfigError> {
        let catalog = ModelCatalog::from_config(config)?;
        let registry = ProviderRegistry::from_config(config)?;
        Ok(Self::new(Arc::new(catalog), Arc::new(registry)))
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    fn route(&self, addressable_id: &str) -> Route {
        let Some((provider_id, model_key)) = split_model_id(addressable_id) else {
            return Route::Malformed;
        };
        match self.registry.get(provider_id) {
            Some(provider) => Route::Call {
                provider,
                model_key: model_key.to_string(),
            },
            None => Route::UnknownProvider(provider_id.to_string()),
        }
    }

    /// Ask every requested model concurrently.
    ///
    /// Returns one outcome per requested id, in request order, once every
    /// call has settled. Per-model errors never fail the batch.
    pub async fn dispatch(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatResponseBatch, DispatchError> {
        request.validate()?;

        let consultation = Uuid::new_v4();
        info!(
            %consultation,
            models = request.models.len(),
            "Starting consultation"
        );

        let labels = request
            .models
            .iter()
            .map(|id| self.catalog.label(id))
            .collect::<Vec<_>>();
        let mut aggregator = Aggregator::new(labels.clone());

        let prompt: Arc<str> = Arc::from(request.prompt.as_str());
        let mut tasks = JoinSet::new();

        for (index, (addressable_id, label)) in request.models.iter().zip(labels).enumerate() {
            match self.route(addressable_id) {
                Route::Malformed => {
                    warn!(%consultation, model = %addressable_id, "Malformed model id");
                    aggregator.record(
                        index,
                        label.failure(format!("Malformed model id: {addressable_id}")),
                    );
                }
                Route::UnknownProvider(provider_id) => {
                    warn!(%consultation, model = %addressable_id, "Unknown provider");
                    aggregator.record(
                        index,
                        label.failure(format!("Unknown provider: {provider_id}")),
                    );
                }
                Route::Call {
                    provider,
                    model_key,
                } => {
                    let prompt = Arc::clone(&prompt);
                    tasks.spawn(async move {
                        let started = Instant::now();
                        let result = provider.send_completion(&prompt, &model_key).await;
                        let elapsed_ms =
                            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

                        let outcome = match result {
                            Ok(text) => {
                                debug!(model = %label.addressable_id, elapsed_ms, "Model answered");
                                label.success(text, elapsed_ms)
                            }
                            Err(e) => {
                                warn!(
                                    model = %label.addressable_id,
                                    provider = e.provider(),
                                    error = %e,
                                    "Model call failed"
                                );
                                label.failure(e.to_string())
                            }
                        };
                        (index, outcome)
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => aggregator.record(index, outcome),
                Err(e) => warn!(%consultation, "Provider task aborted: {}", e),
            }
        }

        let unsettled = aggregator.pending();
        if unsettled > 0 {
            warn!(%consultation, unsettled, "Some provider calls never reported back");
        }

        let batch = aggregator.finish();
        let summary = batch.summary();
        info!(
            %consultation,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Consultation finished"
        );
        Ok(batch)
    }
}
