//! OAuth client-credentials token for the cloud-management API

use crate::aura::http::{HttpClient, HttpRequest};
use crate::config::AuraApiConfig;
use crate::error::{GdsError, GdsResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    token_type: String,
}

/// An issued access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_at,
        }
    }

    /// A token is expired from its expiry instant on
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Holds the current token and refreshes it once it expires.
///
/// Refresh happens inline under the lock, so concurrent callers wait for a
/// single token request.
pub struct TokenLifecycle {
    http: Arc<dyn HttpClient>,
    token_uri: String,
    client_id: String,
    client_secret: String,
    current: Mutex<Option<AuthToken>>,
}

impl TokenLifecycle {
    pub fn new(http: Arc<dyn HttpClient>, config: &AuraApiConfig) -> Self {
        Self {
            http,
            token_uri: format!("{}/oauth/token", config.base_uri),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            current: Mutex::new(None),
        }
    }

    /// A valid access token, refreshed if needed
    pub async fn token(&self) -> GdsResult<String> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *current = Some(fresh);
        Ok(access_token)
    }

    async fn request_token(&self) -> GdsResult<AuthToken> {
        debug!("Updating oauth token");

        let basic = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let request = HttpRequest::post(&self.token_uri)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")]);

        let response: TokenResponse = self.http.send(request).await?.error_for_status()?.json()?;
        let expires_at = Duration::try_seconds(response.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                GdsError::UnexpectedResponse(format!(
                    "Token lifetime of {} seconds is out of range",
                    response.expires_in
                ))
            })?;
        Ok(AuthToken::new(response.access_token, response.token_type, expires_at))
    }
}
