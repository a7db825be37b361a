use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthFailure;

use super::token::SessionToken;

/// Wire shape of `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenResponse {
    /// `None` when `expires_in` does not land on a representable instant.
    pub fn into_token(self) -> Option<SessionToken> {
        let expires_at = Utc::now().checked_add_signed(chrono::Duration::try_seconds(self.expires_in)?)?;
        Some(SessionToken::new(self.access_token, self.refresh_token, expires_at))
    }
}

/// Exchanges a refresh credential for a rotated pair.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<SessionToken, AuthFailure>;
}

#[derive(Clone)]
pub struct HttpTokenRefresher {
    base: Url,
    client: reqwest::Client,
}

impl HttpTokenRefresher {
    pub fn new(base: Url, client: reqwest::Client) -> Self { Self { base, client } }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<SessionToken, AuthFailure> {
        let url = self.base.join("/auth/refresh").map_err(|_| AuthFailure::RefreshFailed)?;
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| {
                debug!(target: "bridge", "refresh transport failure: {e}");
                AuthFailure::RefreshFailed
            })?;
        if !resp.status().is_success() {
            debug!(target: "bridge", status = %resp.status(), "refresh rejected");
            return Err(AuthFailure::RefreshFailed);
        }
        let body: TokenResponse = resp.json().await.map_err(|e| {
            debug!(target: "bridge", "refresh reply unreadable: {e}");
            AuthFailure::RefreshFailed
        })?;
        body.into_token().ok_or_else(|| {
            debug!(target: "bridge", "refresh reply carried an unusable expiry");
            AuthFailure::RefreshFailed
        })
    }
}
