use crate::audit;
use crate::config::Config;
use crate::enrichment::IdentityProvider;
use crate::errors::{AppError, ResultExt};
use crate::models::PartyKind;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const PROVIDER: &str = "identity";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Tokens are refreshed this long before the server-side expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

// ============ Identity Provider API Integration ============

/// OAuth client-credentials client for the payer/payee directory.
pub struct IdentityService {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

impl IdentityService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Self::with_credentials(
            &config.pay_api_url,
            &config.pay_client_id,
            &config.pay_client_secret,
        )
    }

    pub fn with_credentials(
        base_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create Identity Provider client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Fetch a payer record. `Ok(None)` when the payer does not exist.
    pub async fn get_payer_by_id(&self, id: &str) -> Result<Option<Value>, AppError> {
        self.get_party(id, PartyKind::Payer).await
    }

    /// Fetch a payee record. `Ok(None)` when the payee does not exist.
    pub async fn get_payee_by_id(&self, id: &str) -> Result<Option<Value>, AppError> {
        self.get_party(id, PartyKind::Payee).await
    }

    async fn get_party(&self, id: &str, kind: PartyKind) -> Result<Option<Value>, AppError> {
        let url = format!("{}/api/v1/{}/{}", self.base_url, collection(kind), id);
        let mut retried = false;

        loop {
            let token = self.access_token().await?;
            tracing::info!("Fetching {} {} from Identity Provider", kind.as_str(), id);

            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| {
                    audit::api_error(PROVIDER, id, None, &e.to_string());
                    AppError::UpstreamApi(format!("Identity Provider request failed: {}", e))
                })?;

            match response.status() {
                StatusCode::UNAUTHORIZED if !retried => {
                    audit::session_token_expired(PROVIDER, id);
                    self.invalidate_token().await;
                    retried = true;
                    continue;
                }
                StatusCode::NOT_FOUND => {
                    tracing::info!("{} {} not found in Identity Provider", kind.as_str(), id);
                    return Ok(None);
                }
                status if !status.is_success() => {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    audit::api_error(PROVIDER, id, Some(status.as_u16()), &error_text);
                    return Err(AppError::UpstreamApi(format!(
                        "Identity Provider returned {}: {}",
                        status, error_text
                    )));
                }
                _ => {}
            }

            let data: Value = response
                .json()
                .await
                .map_err(AppError::from)
                .context("parsing Identity Provider party record")?;
            return Ok(Some(data));
        }
    }

    /// Returns the cached bearer token, fetching a new one when it is
    /// missing or inside the expiry margin.
    async fn access_token(&self) -> Result<String, AppError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_token(&self) -> Result<AccessToken, AppError> {
        let url = format!("{}/passport/oauth/token", self.base_url);
        tracing::debug!("Requesting Identity Provider access token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", "PAYMENTS"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                audit::auth_error(PROVIDER, None, &e.to_string());
                AppError::UpstreamAuth(format!("Identity Provider token request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            audit::auth_error(PROVIDER, Some(status.as_u16()), &error_text);
            return Err(AppError::UpstreamAuth(format!(
                "Identity Provider token endpoint returned {}: {}",
                status, error_text
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            AppError::UpstreamAuth(format!("Failed to parse token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS));
        Ok(AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityService {
    async fn get_party_by_id(&self, id: &str, kind: PartyKind) -> Result<Option<Value>, AppError> {
        match kind {
            PartyKind::Payer => self.get_payer_by_id(id).await,
            PartyKind::Payee => self.get_payee_by_id(id).await,
        }
    }
}

fn collection(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Payer => "payers",
        PartyKind::Payee => "payees",
    }
}
