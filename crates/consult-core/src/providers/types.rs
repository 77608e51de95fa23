//! Provider-agnostic types for multi-provider completion

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// System instruction sent with every completion request
pub const SYSTEM_PROMPT: &str =
    "You are a smart and helpful assistant. Answer clearly and in detail.";

/// Upper bound on generated tokens per completion
pub const MAX_OUTPUT_TOKENS: u32 = 2000;

/// Sampling temperature used by every adapter that accepts one
pub const TEMPERATURE: f32 = 0.7;

/// Why a single completion call failed.
///
/// The display text is what ends up in a failed outcome, so it never
/// contains credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider answered, but with an error status or an unusable body
    #[error("{message}")]
    Adapter { provider: String, message: String },
    /// The request never completed (DNS, refused connection, timeout)
    #[error("{message}")]
    Transport { provider: String, message: String },
}

impl ProviderError {
    pub fn adapter(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Display name of the provider that produced the error
    pub fn provider(&self) -> &str {
        match self {
            Self::Adapter { provider, .. } | Self::Transport { provider, .. } => provider,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Wire format a provider speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `POST {endpoint}` with `{model, messages, max_tokens, temperature}`
    #[default]
    OpenaiCompatible,
    /// Anthropic messages API
    Anthropic,
    /// Google `generateContent`, model key in the URL path
    Google,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenaiCompatible => write!(f, "openai_compatible"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Google => write!(f, "google"),
        }
    }
}

/// Trait that every provider adapter implements.
///
/// One call to [`send_completion`](CompletionProvider::send_completion) is
/// exactly one outbound HTTP request. Retries, caching and rate limiting are
/// not part of this contract; they would wrap an implementation instead.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Configuration id of the provider (e.g. "openai", "google")
    fn provider_id(&self) -> &str;

    /// Send `prompt` to `model_key` and return the primary text of the answer
    async fn send_completion(&self, prompt: &str, model_key: &str)
    -> Result<String, ProviderError>;
}
