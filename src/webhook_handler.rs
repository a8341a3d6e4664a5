use crate::errors::AppError;
use crate::handlers::AppState;
use crate::signature::SignatureHeaders;
use crate::webhook_models::WebhookResponse;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

/// Payment webhook handler
///
/// Receives payment event notifications, verifies the signature over the raw
/// body, and scores the transaction before answering.
///
/// Authentication: `digest`, `signature-input` and `signature` headers
/// signed with `PAY_WEBHOOK_SECRET`.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    let signature_headers = SignatureHeaders::from_header_map(&headers);
    let outcome = state.service.process(&body, &signature_headers).await?;

    Ok((
        StatusCode::OK,
        Json(WebhookResponse {
            status: "success".to_string(),
            message: "Webhook processed successfully".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            verdict: outcome.verdict.as_str().to_string(),
        }),
    ))
}
