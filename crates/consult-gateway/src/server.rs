//! Gateway HTTP server — axum routes over a shared [`Dispatcher`]

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use consult_core::{ChatRequest, Dispatcher};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::protocol::{
    ChatBody, ChatEnvelope, ErrorEnvelope, HealthStatus, ModelsEnvelope, routes,
};

/// The consult HTTP server
pub struct GatewayServer {
    host: String,
    port: u16,
    dispatcher: Dispatcher,
}

impl GatewayServer {
    pub fn new(host: impl Into<String>, port: u16, dispatcher: Dispatcher) -> Self {
        Self {
            host: host.into(),
            port,
            dispatcher,
        }
    }

    /// All routes with permissive CORS, ready to serve or to test with `oneshot`
    pub fn router(&self) -> Router {
        Router::new()
            .route(routes::MODELS, get(list_models))
            .route(routes::CHAT, post(chat))
            .route(routes::HEALTH, get(health))
            .layer(CorsLayer::permissive())
            .with_state(self.dispatcher.clone())
    }

    /// Bind and serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind gateway to {}", addr))?;
        let local = listener
            .local_addr()
            .context("Failed to read gateway address")?;

        info!("Gateway listening on http://{}", local);
        info!(
            "  GET  {}  ({} models)",
            routes::MODELS,
            self.dispatcher.catalog().len()
        );
        info!("  POST {}", routes::CHAT);
        info!("  GET  {}", routes::HEALTH);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Gateway server error")?;

        info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn list_models(State(dispatcher): State<Dispatcher>) -> Json<ModelsEnvelope> {
    Json(ModelsEnvelope::new(dispatcher.catalog().list_models()))
}

async fn chat(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!("Rejected chat body: {}", rejection.body_text());
            return bad_request(rejection.body_text());
        }
    };

    let request = ChatRequest::new(body.prompt, body.models);
    match dispatcher.dispatch(&request).await {
        Ok(batch) => Json(ChatEnvelope::from_batch(&batch)).into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok(
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    ))
}

fn bad_request(error: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorEnvelope::new(error))).into_response()
}
