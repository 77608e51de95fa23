//! Shared request/response plumbing for the adapters

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::ProviderError;
use crate::redact::redact_credentials;

/// Build the HTTP client used by one provider
pub(crate) fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

/// Send `body` as JSON and decode a successful answer into `T`.
///
/// Error statuses become [`ProviderError::Adapter`] carrying the provider's
/// own `error.message` when the body has one, otherwise `fallback`.
pub(crate) async fn post_json<B, T>(
    request: RequestBuilder,
    provider: &str,
    body: &B,
) -> Result<T, ProviderError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    debug!(provider, status = status.as_u16(), bytes = text.len(), "Provider response");

    if !status.is_success() {
        let message = provider_error_message(&text)
            .unwrap_or_else(|| format!("{provider} API error (HTTP {})", status.as_u16()));
        return Err(ProviderError::adapter(provider, redact_credentials(&message)));
    }

    serde_json::from_str(&text).map_err(|e| {
        ProviderError::adapter(provider, format!("{provider} returned an unreadable response: {e}"))
    })
}

/// Pull `error.message` (or a bare string `error`) out of an error body
pub(crate) fn provider_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = match error {
        Value::String(s) => s.as_str(),
        other => other.get("message")?.as_str()?,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

fn transport_error(provider: &str, error: &reqwest::Error) -> ProviderError {
    warn!(
        provider,
        error = %redact_credentials(&error.to_string()),
        "Provider request did not complete"
    );
    let message = if error.is_timeout() {
        format!("Request to {provider} timed out")
    } else {
        format!("Could not connect to {provider}")
    };
    ProviderError::transport(provider, message)
}
