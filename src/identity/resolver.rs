//! Principal resolution from an ambient session handle.
//!
//! Two implementations feed the same guard contract: [`StoreResolver`] reads the
//! server's session table directly, [`HttpIdentityResolver`] asks the session lookup
//! endpoint. Both go through [`Principal::from_record`] and both fail closed.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::principal::{Principal, UserRecord};
use super::provider::UserDirectory;
use super::session::{SessionGrant, SessionStore};

pub const SESSION_COOKIE: &str = "workgate_session";
pub const REFRESH_COOKIE: &str = "workgate_refresh";

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all("cookie").iter() {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k == name && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}

/// Opaque session handle as carried by the browser: primary and refresh cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionHandle {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl SessionHandle {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            access: parse_cookie(headers, SESSION_COOKIE),
            refresh: parse_cookie(headers, REFRESH_COOKIE),
        }
    }

    pub fn from_grant(grant: &SessionGrant) -> Self {
        Self { access: Some(grant.access_token.clone()), refresh: Some(grant.refresh_token.clone()) }
    }

    pub fn is_empty(&self) -> bool { self.access.is_none() && self.refresh.is_none() }

    /// Render as a `Cookie` request header value.
    pub fn cookie_header(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(a) = &self.access { parts.push(format!("{}={}", SESSION_COOKIE, a)); }
        if let Some(r) = &self.refresh { parts.push(format!("{}={}", REFRESH_COOKIE, r)); }
        if parts.is_empty() { None } else { Some(parts.join("; ")) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Authenticated(Principal),
    Unauthenticated,
}

impl Resolution {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Resolution::Authenticated(p) => Some(p),
            Resolution::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool { matches!(self, Resolution::Authenticated(_)) }
}

/// Body of a successful session lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionLookup {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserRecord,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, handle: &SessionHandle) -> Resolution;
}

/// Resolves against the in-process session table and user directory.
#[derive(Clone)]
pub struct StoreResolver {
    pub sessions: SessionStore,
    pub users: UserDirectory,
}

impl StoreResolver {
    pub fn new(sessions: SessionStore, users: UserDirectory) -> Self { Self { sessions, users } }

    /// Find the live session behind a handle: primary cookie first, refresh cookie second.
    pub fn grant_for(&self, handle: &SessionHandle) -> Option<SessionGrant> {
        handle
            .access
            .as_deref()
            .and_then(|a| self.sessions.validate_access(a))
            .or_else(|| handle.refresh.as_deref().and_then(|r| self.sessions.validate_refresh(r)))
    }

    pub fn lookup(&self, handle: &SessionHandle) -> Option<SessionLookup> {
        let grant = self.grant_for(handle)?;
        let user = self.users.get(&grant.user_id)?;
        Some(SessionLookup {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: grant.access_expires_at,
            user,
        })
    }

    pub fn resolve_now(&self, handle: &SessionHandle) -> Resolution {
        match self.lookup(handle) {
            Some(l) => Resolution::Authenticated(Principal::from_record(&l.user)),
            None => Resolution::Unauthenticated,
        }
    }

    /// Bearer variant used by the backend surface: only a live access credential counts.
    pub fn resolve_bearer(&self, token: &str) -> Resolution {
        let Some(grant) = self.sessions.validate_access(token) else { return Resolution::Unauthenticated };
        match self.users.get(&grant.user_id) {
            Some(rec) => Resolution::Authenticated(Principal::from_record(&rec)),
            None => Resolution::Unauthenticated,
        }
    }
}

#[async_trait]
impl IdentityResolver for StoreResolver {
    async fn resolve(&self, handle: &SessionHandle) -> Resolution {
        self.resolve_now(handle)
    }
}

/// Resolves by calling `GET /auth/session` with the handle as cookies.
#[derive(Clone)]
pub struct HttpIdentityResolver {
    base: Url,
    client: reqwest::Client,
}

impl HttpIdentityResolver {
    pub fn new(base: Url, client: reqwest::Client) -> Self { Self { base, client } }

    pub async fn lookup(&self, handle: &SessionHandle) -> Option<SessionLookup> {
        let cookie = handle.cookie_header()?;
        let url = self.base.join("/auth/session").ok()?;
        let resp = match self.client.get(url).header(reqwest::header::COOKIE, cookie).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(target: "identity", "session lookup transport failure: {e}");
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(target: "identity", status = %resp.status(), "session lookup rejected");
            return None;
        }
        match resp.json::<SessionLookup>().await {
            Ok(l) => Some(l),
            Err(e) => {
                debug!(target: "identity", "session lookup parse failure: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self, handle: &SessionHandle) -> Resolution {
        match self.lookup(handle).await {
            Some(l) => Resolution::Authenticated(Principal::from_record(&l.user)),
            None => Resolution::Unauthenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_str(cookie).unwrap());
        h
    }

    #[test]
    fn handle_parses_both_cookie_variants() {
        let h = SessionHandle::from_headers(&headers("theme=dark; workgate_session=abc; workgate_refresh=def"));
        assert_eq!(h.access.as_deref(), Some("abc"));
        assert_eq!(h.refresh.as_deref(), Some("def"));
        assert_eq!(h.cookie_header().as_deref(), Some("workgate_session=abc; workgate_refresh=def"));
        assert!(SessionHandle::from_headers(&headers("workgate_session=")).is_empty());
    }

    #[tokio::test]
    async fn store_resolver_falls_back_to_refresh_cookie_and_fails_closed() {
        let sessions = SessionStore::default();
        let users = UserDirectory::new();
        let u = users.create("ada@example.com", Some("Ada"), Some("pw")).unwrap();
        let grant = sessions.issue_expiring_at(&u.id, Utc::now() - chrono::Duration::seconds(1)).unwrap();
        let resolver = StoreResolver::new(sessions, users);

        let only_expired_access = SessionHandle { access: Some(grant.access_token.clone()), refresh: None };
        assert_eq!(resolver.resolve(&only_expired_access).await, Resolution::Unauthenticated);

        let with_refresh = SessionHandle::from_grant(&grant);
        let r = resolver.resolve(&with_refresh).await;
        assert_eq!(r.principal().map(|p| p.id.as_str()), Some(u.id.as_str()));

        assert_eq!(resolver.resolve(&SessionHandle::default()).await, Resolution::Unauthenticated);
        assert_eq!(resolver.resolve_bearer(&grant.access_token), Resolution::Unauthenticated);
    }

    #[tokio::test]
    async fn http_resolver_treats_unreachable_endpoint_as_unauthenticated() {
        let resolver = HttpIdentityResolver::new(Url::parse("http://127.0.0.1:9").unwrap(), reqwest::Client::new());
        let h = SessionHandle { access: Some("x".into()), refresh: None };
        assert_eq!(resolver.resolve(&h).await, Resolution::Unauthenticated);
    }
}
