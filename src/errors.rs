use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Reasons an inbound request fails signature verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// One of `digest`, `signature-input` or `signature` is absent.
    #[error("Missing required headers")]
    MissingHeaders,
    /// `digest` header does not match SHA-1 of the body.
    #[error("Invalid digest")]
    DigestMismatch,
    /// HMAC over the signature base string does not match.
    #[error("Invalid signature")]
    InvalidSignature,
    /// No shared secret configured. Operator error, never the caller's fault.
    #[error("Webhook secret is not configured")]
    MissingSecret,
}

/// Structural or field-level problems with a webhook body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid JSON payload: {0}")]
    MalformedJson(String),
    #[error("Invalid JSON payload")]
    InvalidPayload,
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl ValidationError {
    /// Fields reported as missing, empty for the other variants.
    pub fn missing_fields(&self) -> &[String] {
        match self {
            ValidationError::MissingFields(fields) => fields,
            _ => &[],
        }
    }
}

/// Transaction-identifying context attached to failures after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionContext {
    pub transaction_id: String,
    pub event_type: String,
    pub amount: String,
    pub currency: String,
    pub country: String,
}

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Inbound request failed signature verification.
    Signature(SignatureError),
    /// Webhook body is malformed or lacks required fields.
    Validation(ValidationError),
    /// Identity Provider lookup failed. Swallowed by the enrichment engine.
    Enrichment(String),
    /// Could not obtain or renew a credential for an upstream API.
    UpstreamAuth(String),
    /// Upstream API unreachable or returned an error.
    UpstreamApi(String),
    /// Failure after normalization, carrying the transaction it belongs to.
    Processing {
        context: TransactionContext,
        source: Box<AppError>,
    },
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Signature(e) => write!(f, "Signature error: {}", e),
            AppError::Validation(e) => write!(f, "Validation error: {}", e),
            AppError::Enrichment(msg) => write!(f, "Enrichment error: {}", msg),
            AppError::UpstreamAuth(msg) => write!(f, "Upstream authentication error: {}", msg),
            AppError::UpstreamApi(msg) => write!(f, "Upstream API error: {}", msg),
            AppError::Processing { context, source } => write!(
                f,
                "Failed to process transaction {} ({}): {}",
                context.transaction_id, context.event_type, source
            ),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status the error surfaces as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Signature(SignatureError::MissingSecret) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Signature(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::WithContext { source, .. } => source.status_code(),
            AppError::Enrichment(_)
            | AppError::UpstreamAuth(_)
            | AppError::UpstreamApi(_)
            | AppError::Processing { .. }
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    ///
    /// Client-facing failures (401/400) carry the reason; server-side failures
    /// are logged with full detail and answered with a generic message.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Signature(SignatureError::MissingSecret) => {
                tracing::error!(
                    event = "configuration_error",
                    "Webhook secret is not configured; rejecting signed request"
                );
                json!({ "error": "Internal server error" })
            }
            AppError::Signature(SignatureError::MissingHeaders) => json!({
                "error": SignatureError::MissingHeaders.to_string(),
                "required": ["signature", "signature-input", "digest"],
            }),
            AppError::Signature(e) => {
                tracing::warn!("Webhook rejected: {}", e);
                json!({ "error": e.to_string() })
            }
            AppError::Validation(ValidationError::MissingFields(fields)) => json!({
                "error": "Missing required fields",
                "missing": fields,
                "missing_fields": fields,
            }),
            AppError::Validation(e) => json!({ "error": e.to_string() }),
            AppError::Processing { context, source } => {
                tracing::debug!(
                    transaction_id = %context.transaction_id,
                    "Answering 500 for failed transaction: {}",
                    source
                );
                json!({
                    "error": "Internal server error",
                    "timestamp": Utc::now().to_rfc3339(),
                })
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.as_ref().clone().into_response();
            }
            other => {
                tracing::error!("{}", other);
                json!({
                    "error": "Internal server error",
                    "timestamp": Utc::now().to_rfc3339(),
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        AppError::Signature(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamApi(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}
