//! OpenAI-style chat completions (OpenAI, DeepSeek, Groq and friends)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::post_json;
use super::types::{
    CompletionProvider, MAX_OUTPUT_TOKENS, ProviderError, SYSTEM_PROMPT, TEMPERATURE,
};
use crate::config::ProviderConfig;

/// Adapter for any endpoint that speaks the OpenAI chat completions format
pub struct OpenAiCompatProvider {
    client: Client,
    config: ProviderConfig,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("provider", &self.config.id)
            .field("endpoint", &self.config.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(config: ProviderConfig, client: Client) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn provider_id(&self) -> &str {
        &self.config.id
    }

    async fn send_completion(
        &self,
        prompt: &str,
        model_key: &str,
    ) -> Result<String, ProviderError> {
        let provider = self.config.display_name.as_str();
        let body = CompletionRequest {
            model: model_key,
            messages: [
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!(provider, model = model_key, "Sending chat completion");

        let request = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key);
        let response: CompletionResponse = post_json(request, provider, &body).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| {
                ProviderError::adapter(provider, format!("{provider} response contained no text"))
            })
    }
}
