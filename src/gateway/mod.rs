//! Axum-based HTTP gateway.
//!
//! - `POST /api/chat` runs the orchestrator for one conversation
//! - `GET /health` reports liveness and the configured models
//!
//! Request bodies are capped at [`MAX_BODY_SIZE`]. No request timeout is
//! applied: a chat request lasts as long as its model calls do.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::Config;
use crate::memory::create_store;
use crate::pipeline::{ChatRequest, Orchestrator, PipelineError, MESSAGES_REQUIRED};
use crate::providers::{sanitize_api_error, ModelGateway, OpenAiGateway};

/// Maximum request body size (1 MiB).
pub const MAX_BODY_SIZE: usize = 1_048_576;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build the router with CORS and body-limit middleware.
pub fn build_router(state: AppState) -> Router {
    // Browser clients call the API directly from any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
}

/// Run the HTTP gateway until Ctrl+C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let api_key = config.require_api_key()?;
    let gateway: Arc<dyn ModelGateway> = Arc::new(OpenAiGateway::new(
        api_key,
        Some(&config.api_url),
        config.request_timeout_secs,
    ));
    let orchestrator =
        Orchestrator::new(gateway, &config.models).with_store(create_store(&config.store));

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr()?;

    tracing::info!(
        address = %local,
        perception = %config.models.perception,
        integration = %config.models.integration,
        expansion = %config.models.expansion,
        store = ?config.store.kind,
        "NextLevel orchestrator listening"
    );
    println!("NextLevel orchestrator listening on http://{local}");
    println!("  POST /api/chat  {{\"userId\": \"...\", \"messages\": [{{\"role\": \"user\", \"content\": \"...\"}}]}}");
    println!("  GET  /health    health check");
    println!("  Press Ctrl+C to stop.\n");

    let app = build_router(AppState::new(orchestrator));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health: liveness plus the configured models
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let models = state.orchestrator.models();
    Json(serde_json::json!({
        "status": "ok",
        "models": {
            "perception": models.perception,
            "integration": models.integration,
            "expansion": models.expansion,
        },
        "retrieval": state.orchestrator.retrieval_name(),
        "store": state.orchestrator.store_name(),
    }))
}

/// POST /api/chat: run the three-phase pipeline for one conversation.
async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::warn!("Chat request rejected: {e}");
            return e.into_response();
        }
        Err(e) => {
            tracing::warn!("Chat request rejected: {e}");
            return error_response(StatusCode::BAD_REQUEST, MESSAGES_REQUIRED, None);
        }
    };

    match state.orchestrator.handle(request).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => pipeline_error_response(&err),
    }
}

fn pipeline_error_response(err: &PipelineError) -> Response {
    match err {
        PipelineError::Validation(message) => {
            error_response(StatusCode::BAD_REQUEST, message, None)
        }
        _ => error_response(
            err.status_code(),
            "Internal server error",
            Some(sanitize_api_error(&err.to_string())),
        ),
    }
}

fn error_response(status: StatusCode, error: &str, details: Option<String>) -> Response {
    let body = match details {
        Some(details) => serde_json::json!({ "error": error, "details": details }),
        None => serde_json::json!({ "error": error }),
    };
    (status, Json(body)).into_response()
}
