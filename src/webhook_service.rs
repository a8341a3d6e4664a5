//! Orchestrator: runs one webhook through verification, normalization,
//! enrichment, mapping and scoring.
//!
//! ```text
//! RECEIVED → VALIDATED → NORMALIZED → ENRICHED → MAPPED → SCORED → LOGGED_SUCCESS
//!     └──────────┴────────────┴───────────┴─────────┴────────┴──→ LOGGED_FAILURE
//! ```

use crate::audit;
use crate::config::Config;
use crate::enrichment::{CustomerDataCache, EnrichmentEngine, IdentityProvider};
use crate::errors::{AppError, TransactionContext};
use crate::mapper::TransactionMapper;
use crate::models::TransactionRecord;
use crate::normalizer;
use crate::scoring_client::ScoringProvider;
use crate::scoring_models::{ScoringResponse, Verdict};
use crate::signature::{SignatureHeaders, SignatureVerifier};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Normalized,
    Enriched,
    Mapped,
    Scored,
    LoggedSuccess,
    LoggedFailure,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "RECEIVED",
            Stage::Validated => "VALIDATED",
            Stage::Normalized => "NORMALIZED",
            Stage::Enriched => "ENRICHED",
            Stage::Mapped => "MAPPED",
            Stage::Scored => "SCORED",
            Stage::LoggedSuccess => "LOGGED_SUCCESS",
            Stage::LoggedFailure => "LOGGED_FAILURE",
        };
        f.write_str(name)
    }
}

/// Result of a successfully scored webhook.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub request_id: Uuid,
    pub transaction_id: String,
    pub verdict: Verdict,
    pub response: ScoringResponse,
}

pub struct WebhookService {
    verifier: SignatureVerifier,
    identity: Arc<dyn IdentityProvider>,
    scoring: Arc<dyn ScoringProvider>,
    mapper: TransactionMapper,
    default_country: Option<String>,
}

impl WebhookService {
    pub fn new(
        config: &Config,
        identity: Arc<dyn IdentityProvider>,
        scoring: Arc<dyn ScoringProvider>,
    ) -> Self {
        Self {
            verifier: SignatureVerifier::new(config.webhook_secret.clone()),
            identity,
            scoring,
            mapper: TransactionMapper::new(&config.platform_id, &config.seller_id),
            default_country: config.default_country.clone(),
        }
    }

    /// Processes one webhook.
    ///
    /// Signature and validation failures are returned as-is. Anything failing
    /// after normalization is wrapped in [`AppError::Processing`].
    pub async fn process(
        &self,
        body: &[u8],
        headers: &SignatureHeaders,
    ) -> Result<ProcessingOutcome, AppError> {
        let request_id = Uuid::new_v4();
        let mut cache = CustomerDataCache::new();

        cache.clear();
        audit::webhook_received(request_id, body.len(), headers);
        transition(request_id, Stage::Received);

        let result = self.run(request_id, body, headers, &mut cache).await;
        cache.clear();

        match &result {
            Ok(outcome) => {
                transition(request_id, Stage::LoggedSuccess);
                tracing::info!(
                    request_id = %request_id,
                    transaction_id = %outcome.transaction_id,
                    verdict = %outcome.verdict,
                    "Webhook processed"
                );
            }
            Err(e) => {
                transition(request_id, Stage::LoggedFailure);
                tracing::warn!(request_id = %request_id, "Webhook failed: {}", e);
            }
        }

        result
    }

    async fn run(
        &self,
        request_id: Uuid,
        body: &[u8],
        headers: &SignatureHeaders,
        cache: &mut CustomerDataCache,
    ) -> Result<ProcessingOutcome, AppError> {
        self.verifier.verify(body, headers)?;
        transition(request_id, Stage::Validated);

        let record = normalizer::normalize_bytes(body)?;
        audit::transaction_normalized(request_id, &record);
        transition(request_id, Stage::Normalized);

        let mut context = TransactionContext {
            transaction_id: record.id.clone(),
            event_type: record.event_type.clone(),
            amount: record.amount.to_string(),
            currency: record.currency.clone(),
            country: String::new(),
        };

        match self.score_record(request_id, &record, cache, &mut context).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                audit::processing_error(request_id, &context, &e);
                Err(AppError::Processing {
                    context,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn score_record(
        &self,
        request_id: Uuid,
        record: &TransactionRecord,
        cache: &mut CustomerDataCache,
        context: &mut TransactionContext,
    ) -> Result<ProcessingOutcome, AppError> {
        let enrichment = EnrichmentEngine::new(self.identity.as_ref(), cache)
            .enrich(record)
            .await;

        let country = if enrichment.country.is_empty() {
            self.default_country.clone().unwrap_or_default()
        } else {
            enrichment.country.clone()
        };
        context.country = country.clone();
        transition(request_id, Stage::Enriched);

        let request = self.mapper.map(
            record,
            &enrichment.customer,
            &enrichment.billing_address,
            &country,
        );
        audit::data_mapping(record, &request);
        transition(request_id, Stage::Mapped);

        let response = self.scoring.score(&request).await?;
        let verdict = response.verdict();
        audit::scoring_response(&request, &response, verdict);
        if response.has_validation_errors() {
            audit::validation_errors(&record.id, &response);
        }
        transition(request_id, Stage::Scored);

        Ok(ProcessingOutcome {
            request_id,
            transaction_id: record.id.clone(),
            verdict,
            response,
        })
    }
}

fn transition(request_id: Uuid, stage: Stage) {
    tracing::debug!(request_id = %request_id, stage = %stage, "Pipeline stage");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::LoggedSuccess.to_string(), "LOGGED_SUCCESS");
        assert_eq!(Stage::Received.to_string(), "RECEIVED");
    }
}
