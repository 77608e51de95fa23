//! Multi-provider completion layer
//!
//! Every provider is reached through one of three wire formats: OpenAI-style
//! chat completions (OpenAI, DeepSeek, Groq), Anthropic messages, and Google
//! `generateContent`. Each format implements [`CompletionProvider`]; the
//! [`ProviderRegistry`] maps provider ids to their adapter.

pub mod anthropic;
pub mod google;
mod http;
pub mod openai_compat;
pub mod registry;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use registry::ProviderRegistry;
pub use types::{
    CompletionProvider, MAX_OUTPUT_TOKENS, ProviderError, ProviderKind, SYSTEM_PROMPT, TEMPERATURE,
};
