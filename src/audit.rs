//! Structured audit trail.
//!
//! Every record carries an `event` field so log pipelines can route on it.
//! Records are emitted through `tracing`; the subscriber decides the sink.

use crate::errors::{SignatureError, TransactionContext};
use crate::models::TransactionRecord;
use crate::scoring_models::{ScoringRequest, ScoringResponse, Verdict};
use crate::signature::SignatureHeaders;
use uuid::Uuid;

pub fn webhook_received(request_id: Uuid, body_len: usize, headers: &SignatureHeaders) {
    tracing::info!(
        event = "webhook_received",
        request_id = %request_id,
        body_len,
        digest_present = headers.digest.is_some(),
        signature_present = headers.signature.is_some(),
        signature_input_present = headers.signature_input.is_some(),
        "Webhook received"
    );
}

pub fn signature_validated(digest: &str, signature: &str) {
    tracing::info!(
        event = "signature_validation",
        valid = true,
        digest,
        signature,
        "Webhook signature validation: SUCCESS"
    );
}

/// `digests` and `signatures` are `(expected, received)` pairs when known.
pub fn signature_validation_failed(
    reason: SignatureError,
    digests: Option<(&str, &str)>,
    signatures: Option<(&str, &str)>,
) {
    tracing::warn!(
        event = "signature_validation",
        valid = false,
        reason = %reason,
        expected_digest = digests.map(|d| d.0),
        received_digest = digests.map(|d| d.1),
        expected_signature = signatures.map(|s| s.0),
        received_signature = signatures.map(|s| s.1),
        "Webhook signature validation: FAILED"
    );
}

pub fn transaction_normalized(request_id: Uuid, record: &TransactionRecord) {
    tracing::info!(
        event = "transaction_normalized",
        request_id = %request_id,
        transaction_id = %record.id,
        event_type = %record.event_type,
        amount = %record.amount,
        currency = %record.currency,
        status = %record.status,
        counterparty_role = %record.counterparty_role,
        counterparty_id = record.counterparty_id.as_deref(),
        "Transaction normalized"
    );
}

pub fn data_mapping(record: &TransactionRecord, request: &ScoringRequest) {
    tracing::debug!(
        event = "data_mapping",
        transaction_id = %record.id,
        request = %serde_json::to_string(request).unwrap_or_default(),
        "Mapped transaction to scoring request"
    );
}

pub fn scoring_request(request: &ScoringRequest) {
    tracing::debug!(
        event = "scoring_request",
        trans_id = %request.trans_id,
        trans_amt = request.trans_amt,
        pmt_method = %request.pmt_method,
        "Sending transaction for scoring"
    );
}

pub fn scoring_response(request: &ScoringRequest, response: &ScoringResponse, verdict: Verdict) {
    let signals_count = response
        .evidence
        .as_ref()
        .map(|e| e.signals.len())
        .unwrap_or(0);

    if verdict == Verdict::Approved {
        tracing::info!(
            event = "scoring_response",
            trans_id = %request.trans_id,
            scoring_trans_id = response.trans_id.as_deref(),
            decision = response.approved,
            decision_text = verdict.as_str(),
            score = response.score,
            is_liable = response.is_liable,
            validation_ok = response.validation.ok,
            signals_count,
            device_id = response.device_id.as_deref(),
            "Scoring decision: {}",
            verdict
        );
    } else {
        tracing::warn!(
            event = "scoring_response",
            trans_id = %request.trans_id,
            scoring_trans_id = response.trans_id.as_deref(),
            decision = response.approved,
            decision_text = verdict.as_str(),
            score = response.score,
            is_liable = response.is_liable,
            liability_reason = response.liability_reason.as_deref(),
            validation_ok = response.validation.ok,
            signals_count,
            device_id = response.device_id.as_deref(),
            "Scoring decision: {}",
            verdict
        );
    }
}

pub fn validation_errors(transaction_id: &str, response: &ScoringResponse) {
    for err in &response.validation.errors {
        tracing::error!(
            event = "validation_errors",
            trans_id = transaction_id,
            error_count = response.validation.errors.len(),
            field = %err.datapoint,
            message = %err.msg,
            "Scoring Provider rejected a datapoint"
        );
    }
}

pub fn processing_error(request_id: Uuid, context: &TransactionContext, error: &dyn std::fmt::Display) {
    tracing::error!(
        event = "processing_error",
        request_id = %request_id,
        transaction_id = %context.transaction_id,
        event_type = %context.event_type,
        amount = %context.amount,
        currency = %context.currency,
        country = %context.country,
        error = %error,
        "Transaction processing error"
    );
}

pub fn auth_error(provider: &str, status: Option<u16>, message: &str) {
    tracing::error!(
        event = "auth_error",
        provider,
        status,
        error_message = message,
        "Upstream authentication failed"
    );
}

pub fn api_error(provider: &str, subject: &str, status: Option<u16>, message: &str) {
    tracing::error!(
        event = "api_error",
        provider,
        subject,
        status,
        error_message = message,
        "Upstream API error"
    );
}

pub fn session_token_expired(provider: &str, subject: &str) {
    tracing::warn!(
        event = "session_token_expired",
        provider,
        subject,
        "Session token expired, reauthenticating"
    );
}
