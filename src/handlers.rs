use crate::webhook_handler;
use crate::webhook_service::WebhookService;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted webhook body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Webhook pipeline, shared by all requests.
    pub service: Arc<WebhookService>,
}

/// Health check endpoint.
///
/// Returns the service status, current time and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// `POST /webhook` with its body size limit. Rate limiting is layered on by the caller.
pub fn webhook_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler::receive_webhook))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Full application: `/health` plus the given webhook routes, with tracing and CORS.
pub fn app(webhook: Router) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(webhook)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
