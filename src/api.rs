//! REST API server for the chat cascade
//!
//! Exposes `send` plus provider diagnostics over HTTP.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cascade::CascadeOrchestrator;
use crate::error::OrchestrationError;
use crate::models::{ChatContext, ChatMessage, Persona, SendOptions};
use crate::providers::{AdapterKind, AvailabilityWindow};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub context: Option<ChatContext>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Overall deadline for the whole cascade, in milliseconds
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub provider: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One row of the provider listing. Never carries the secret itself.
#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub key: String,
    pub display_name: String,
    pub model: String,
    pub kind: AdapterKind,
    pub credential_present: bool,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<AvailabilityWindow>,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub cascade: Arc<CascadeOrchestrator>,
}

fn status_for(error: &OrchestrationError) -> StatusCode {
    match error {
        OrchestrationError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestrationError::UnknownProvider(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let persona = match req.persona.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(key) => match Persona::from_key(key) {
            Some(persona) => Some(persona),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(format!("Unknown persona: {}", key))),
                )
            }
        },
        None => None,
    };

    let options = SendOptions {
        persona,
        temperature: req.temperature,
        deadline: req.deadline_ms.map(std::time::Duration::from_millis),
    };

    match state
        .cascade
        .send(&req.message, &req.history, req.context.as_ref(), options)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::success(response))),
        Err(e) => {
            warn!(error = %e, "Chat request rejected");
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// =============================
/// Provider Diagnostics
/// =============================

async fn list_providers(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let registry = state.cascade.registry();
    let tracker = state.cascade.tracker();

    registry.refresh_availability().await;

    let mut rows = Vec::new();
    for provider in registry.list_providers().await {
        let available = tracker.is_available(&provider.key).await;
        rows.push(ProviderStatus {
            credential_fingerprint: registry.credential_fingerprint(&provider.key).await,
            window: tracker.window(&provider.key).await,
            key: provider.key,
            display_name: provider.display_name,
            model: provider.model,
            kind: provider.kind,
            credential_present: provider.credential_present,
            available,
        });
    }

    let preferred = state.cascade.preferred_provider().await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "providers": rows,
            "preferred": preferred,
            "synthetic_enabled": state.cascade.synthetic_enabled(),
        }))),
    )
}

async fn reset_providers(
    State(state): State<ApiState>,
    body: Option<Json<ResetRequest>>,
) -> (StatusCode, Json<ApiResponse>) {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    match req.provider {
        Some(key) => match state.cascade.reset_provider(&key).await {
            Ok(cleared) => {
                info!(provider = %key, cleared, "Provider reset via API");
                (
                    StatusCode::OK,
                    Json(ApiResponse::success(serde_json::json!({
                        "provider": key,
                        "cleared": cleared,
                    }))),
                )
            }
            Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
        },
        None => {
            let cleared = state.cascade.reset_all().await;
            info!(cleared, "All providers reset via API");
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({ "cleared": cleared }))),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(cascade: Arc<CascadeOrchestrator>) -> Router {
    let state = ApiState { cascade };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/providers", get(list_providers))
        .route("/api/providers/reset", post(reset_providers))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    cascade: Arc<CascadeOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(cascade.clone());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cascade.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
