//! Anthropic Messages API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::post_json;
use super::types::{
    CompletionProvider, MAX_OUTPUT_TOKENS, ProviderError, SYSTEM_PROMPT, TEMPERATURE,
};
use crate::config::ProviderConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("provider", &self.config.id)
            .field("endpoint", &self.config.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig, client: Client) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn provider_id(&self) -> &str {
        &self.config.id
    }

    async fn send_completion(
        &self,
        prompt: &str,
        model_key: &str,
    ) -> Result<String, ProviderError> {
        let provider = self.config.display_name.as_str();
        let body = MessagesRequest {
            model: model_key,
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
            system: SYSTEM_PROMPT,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(provider, model = model_key, "Sending message");

        let request = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let response: MessagesResponse = post_json(request, provider, &body).await?;

        response
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| {
                ProviderError::adapter(provider, format!("{provider} response contained no text"))
            })
    }
}
