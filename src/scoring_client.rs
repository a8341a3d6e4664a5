use crate::audit;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::scoring_models::{ScoringRequest, ScoringResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

const PROVIDER: &str = "scoring";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

/// Submits transactions for a fraud decision.
#[async_trait]
pub trait ScoringProvider: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringResponse, AppError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Valid(String),
    Expired,
}

/// Client for the Scoring Provider.
///
/// Holds one session token obtained via HTTP basic auth. A rejected token is
/// renewed once per request; a second rejection fails the request.
pub struct ScoringClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    session: Mutex<SessionState>,
}

impl ScoringClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Self::with_credentials(
            &config.fraud_api_url,
            &config.fraud_username,
            &config.fraud_password,
        )
    }

    pub fn with_credentials(base_url: &str, username: &str, password: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create Scoring Provider client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            session: Mutex::new(SessionState::Expired),
        })
    }

    /// Sends a transaction, authenticating first if there is no session.
    pub async fn send_transaction(
        &self,
        request: &ScoringRequest,
    ) -> Result<ScoringResponse, AppError> {
        audit::scoring_request(request);

        match self.post_transaction(request).await? {
            Some(response) => Ok(response),
            None => {
                audit::session_token_expired(PROVIDER, &request.trans_id);
                self.expire_session().await;
                self.post_transaction(request).await?.ok_or_else(|| {
                    audit::auth_error(
                        PROVIDER,
                        Some(StatusCode::UNAUTHORIZED.as_u16()),
                        "session token rejected after reauthentication",
                    );
                    AppError::UpstreamAuth(
                        "Scoring Provider rejected a freshly issued session token".to_string(),
                    )
                })
            }
        }
    }

    /// `Ok(None)` means the session token was rejected.
    async fn post_transaction(
        &self,
        request: &ScoringRequest,
    ) -> Result<Option<ScoringResponse>, AppError> {
        let token = self.session_token().await?;
        let url = format!("{}/api/v2/transaction", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("SessionToken {}", token))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                audit::api_error(PROVIDER, &request.trans_id, None, &e.to_string());
                AppError::UpstreamApi(format!("Scoring Provider request failed: {}", e))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            audit::api_error(PROVIDER, &request.trans_id, Some(status.as_u16()), "unauthorized");
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            audit::api_error(PROVIDER, &request.trans_id, Some(status.as_u16()), &error_text);
            return Err(AppError::UpstreamApi(format!(
                "Scoring Provider returned {}: {}",
                status, error_text
            )));
        }

        let scored: ScoringResponse = response
            .json()
            .await
            .map_err(AppError::from)
            .with_context(|| format!("parsing Scoring Provider response for {}", request.trans_id))?;
        Ok(Some(scored))
    }

    async fn session_token(&self) -> Result<String, AppError> {
        let mut session = self.session.lock().await;
        if let SessionState::Valid(token) = &*session {
            return Ok(token.clone());
        }

        let token = self.authenticate().await?;
        *session = SessionState::Valid(token.clone());
        Ok(token)
    }

    async fn expire_session(&self) {
        *self.session.lock().await = SessionState::Expired;
    }

    async fn authenticate(&self) -> Result<String, AppError> {
        let url = format!("{}/api/v2/sessions", self.base_url);
        tracing::info!("Authenticating with Scoring Provider");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                audit::auth_error(PROVIDER, None, &e.to_string());
                AppError::UpstreamAuth(format!("Failed to authenticate with Scoring Provider: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            audit::auth_error(PROVIDER, Some(status.as_u16()), &error_text);
            return Err(AppError::UpstreamAuth(format!(
                "Scoring Provider session endpoint returned {}: {}",
                status, error_text
            )));
        }

        let body: SessionResponse = response.json().await.map_err(|e| {
            AppError::UpstreamAuth(format!("Failed to parse session response: {}", e))
        })?;
        Ok(body.session_token)
    }
}

#[async_trait]
impl ScoringProvider for ScoringClient {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringResponse, AppError> {
        self.send_transaction(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_starts_expired() {
        let client = ScoringClient::with_credentials("http://localhost:1", "u", "p").unwrap();
        assert_eq!(*client.session.lock().await, SessionState::Expired);
    }

    #[tokio::test]
    async fn test_expire_session_resets_token() {
        let client = ScoringClient::with_credentials("http://localhost:1", "u", "p").unwrap();
        *client.session.lock().await = SessionState::Valid("tok".to_string());
        client.expire_session().await;
        assert_eq!(*client.session.lock().await, SessionState::Expired);
    }

    #[test]
    fn test_session_response_field_name() {
        let body: SessionResponse =
            serde_json::from_value(serde_json::json!({"sessionToken": "abc"})).unwrap();
        assert_eq!(body.session_token, "abc");
    }
}
