//! HTTP API protocol — JSON bodies exchanged with clients

use consult_core::redact::redact_credentials;
use consult_core::{ChatResponseBatch, ModelDescriptor, ModelOutcome};
use serde::{Deserialize, Serialize};

/// `POST /api/chat` request body.
///
/// Missing fields default to empty so they are rejected with the same
/// messages as empty ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub models: Vec<String>,
}

/// `GET /api/models` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsEnvelope {
    pub success: bool,
    pub models: Vec<ModelDescriptor>,
}

/// `POST /api/chat` success response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub success: bool,
    pub responses: Vec<OutcomeBody>,
}

/// Any request-level failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

/// `GET /api/health` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

/// One model's outcome on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBody {
    pub model_id: String,
    pub model_name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
}

/// Route paths served by the gateway
pub mod routes {
    pub const MODELS: &str = "/api/models";
    pub const CHAT: &str = "/api/chat";
    pub const HEALTH: &str = "/api/health";
}

impl ModelsEnvelope {
    pub fn new(models: &[ModelDescriptor]) -> Self {
        Self {
            success: true,
            models: models.to_vec(),
        }
    }
}

impl ChatEnvelope {
    pub fn from_batch(batch: &ChatResponseBatch) -> Self {
        Self {
            success: true,
            responses: batch.iter().map(OutcomeBody::from).collect(),
        }
    }
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

impl HealthStatus {
    pub fn ok(timestamp: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: timestamp.into(),
        }
    }
}

impl From<&ModelOutcome> for OutcomeBody {
    fn from(outcome: &ModelOutcome) -> Self {
        Self {
            model_id: outcome.addressable_id().to_string(),
            model_name: outcome.display_name().to_string(),
            provider: outcome.provider_display_name().to_string(),
            response: outcome.text().map(str::to_string),
            response_time: outcome.elapsed_ms(),
            error: outcome.error_message().map(redact_credentials),
            success: outcome.is_success(),
        }
    }
}
