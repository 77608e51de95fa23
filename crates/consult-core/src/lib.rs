//! consult-core — ask several AI providers the same question at once
//!
//! - [`config`] loads the frozen provider configuration (TOML + environment).
//! - [`catalog`] turns that configuration into addressable `provider:model` ids.
//! - [`providers`] holds one adapter per wire format behind [`CompletionProvider`].
//! - [`dispatcher`] fans a prompt out to the selected models concurrently.
//! - [`aggregator`] puts the settled outcomes back into request order.
//! - [`doctor`] runs offline checks against the configuration.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod doctor;
pub mod providers;
pub mod redact;

pub use aggregator::{Aggregator, BatchSummary, ChatResponseBatch, ModelLabel, ModelOutcome};
pub use catalog::{ModelCatalog, ModelDescriptor, split_model_id};
pub use config::{ConfigError, ConsultConfig, ProviderConfig, ServerConfig};
pub use dispatcher::{ChatRequest, DispatchError, Dispatcher};
pub use providers::{CompletionProvider, ProviderError, ProviderKind, ProviderRegistry};
