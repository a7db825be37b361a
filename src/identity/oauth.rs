//! OAuth initiation against the upstream identity provider.
//! Errors never surface in-page: every failure becomes a sign-in redirect carrying a code.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use reqwest::Url;
use serde::Deserialize;
use tracing::{error, warn};

use crate::error::AppError;

pub const INVALID_PROVIDER: &str = "invalid_provider";
pub const OAUTH_FAILED: &str = "oauth_failed";
pub const INTERNAL_ERROR: &str = "internal_error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub const ALLOWED: [OAuthProvider; 2] = [OAuthProvider::Google, OAuthProvider::Github];

    /// Exact, case-sensitive match against the allow-list.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALLOWED.into_iter().find(|p| p.as_str() == raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    #[error("identity provider failure: {0}")]
    Upstream(String),
    #[error("unexpected oauth failure: {0}")]
    Internal(String),
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::Upstream(_) => OAUTH_FAILED,
            OAuthError::Internal(_) => INTERNAL_ERROR,
        }
    }
}

#[async_trait]
pub trait OAuthUpstream: Send + Sync {
    async fn authorization_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<Url, OAuthError>;
}

#[derive(Debug, Deserialize)]
struct AuthorizeReply {
    #[serde(default)]
    url: Option<String>,
}

/// Asks the identity provider's authorize endpoint for the provider URL
/// (`skip_http_redirect=true` makes it answer with JSON instead of a 302).
#[derive(Clone)]
pub struct HttpOAuthUpstream {
    authorize_url: Option<Url>,
    client: reqwest::Client,
}

impl HttpOAuthUpstream {
    pub fn new(authorize_url: Option<Url>, client: reqwest::Client) -> Self { Self { authorize_url, client } }
}

#[async_trait]
impl OAuthUpstream for HttpOAuthUpstream {
    async fn authorization_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<Url, OAuthError> {
        let Some(endpoint) = self.authorize_url.clone() else {
            return Err(OAuthError::Upstream("authorize endpoint not configured".into()));
        };
        let resp = self
            .client
            .get(endpoint)
            .query(&[("provider", provider.as_str()), ("redirect_to", redirect_to), ("skip_http_redirect", "true")])
            .send()
            .await
            .map_err(|e| OAuthError::Upstream(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(OAuthError::Upstream(format!("HTTP {}", resp.status())));
        }
        let reply: AuthorizeReply = resp.json().await.map_err(|e| OAuthError::Internal(e.to_string()))?;
        let raw = reply.url.ok_or_else(|| OAuthError::Internal("authorize reply without url".into()))?;
        Url::parse(&raw).map_err(|e| OAuthError::Internal(e.to_string()))
    }
}

/// Validate the requested provider and obtain its authorization URL.
pub async fn initiate(upstream: &dyn OAuthUpstream, provider: Option<&str>, redirect_to: &str) -> Result<Url, AppError> {
    let Some(provider) = provider.and_then(OAuthProvider::parse) else {
        warn!(target: "identity", requested = ?provider, "oauth initiation with disallowed provider");
        return Err(AppError::config(INVALID_PROVIDER, "provider is not allowed"));
    };
    let attempt = AssertUnwindSafe(upstream.authorization_url(provider, redirect_to)).catch_unwind().await;
    match attempt {
        Ok(Ok(url)) => Ok(url),
        Ok(Err(e @ OAuthError::Upstream(_))) => {
            warn!(target: "identity", provider = provider.as_str(), "oauth upstream failure: {e}");
            Err(AppError::upstream(e.code().to_string(), e.to_string()))
        }
        Ok(Err(e)) => {
            error!(target: "identity", provider = provider.as_str(), "oauth failure: {e}");
            Err(AppError::internal(e.code().to_string(), e.to_string()))
        }
        Err(_) => {
            error!(target: "identity", provider = provider.as_str(), "oauth upstream panicked");
            Err(AppError::internal(INTERNAL_ERROR, "oauth upstream panicked"))
        }
    }
}
