//! Google Gemini `generateContent`
//!
//! The model key is part of the URL path and the API key travels as the
//! `key` query parameter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::post_json;
use super::types::{
    CompletionProvider, MAX_OUTPUT_TOKENS, ProviderError, SYSTEM_PROMPT, TEMPERATURE,
};
use crate::config::ProviderConfig;

pub struct GoogleProvider {
    client: Client,
    config: ProviderConfig,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("provider", &self.config.id)
            .field("endpoint", &self.config.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
    system_instruction: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: [Part { text }],
        }
    }
}

impl GoogleProvider {
    pub fn new(config: ProviderConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn url(&self, model_key: &str) -> String {
        format!("{}{}:generateContent", self.config.endpoint, model_key)
    }
}

#[async_trait]
impl CompletionProvider for GoogleProvider {
    fn provider_id(&self) -> &str {
        &self.config.id
    }

    async fn send_completion(
        &self,
        prompt: &str,
        model_key: &str,
    ) -> Result<String, ProviderError> {
        let provider = self.config.display_name.as_str();
        let body = GenerateContentRequest {
            contents: [Content::text(prompt)],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
                temperature: TEMPERATURE,
            },
            system_instruction: Content::text(SYSTEM_PROMPT),
        };

        debug!(provider, model = model_key, "Sending generateContent");

        let request = self
            .client
            .post(self.url(model_key))
            .query(&[("key", self.config.api_key.as_str())]);
        let response: GenerateContentResponse = post_json(request, provider, &body).await?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                ProviderError::adapter(provider, format!("{provider} response contained no text"))
            })
    }
}
