//!
//! workgate HTTP server
//! --------------------
//! Axum router for the identity surface (cookie sessions), the server-rendered
//! entry pages that apply the onboarding redirect policy, the cookie-protected
//! `/api` routes, and the bearer-authenticated `/v1` backend surface.
//!
//! Responsibilities:
//! - Password sign-up/sign-in issuing a primary and a refresh cookie.
//! - Session lookup and credential rotation for the client-side session bridge.
//! - OAuth initiation with every failure mapped to a sign-in redirect code.
//! - Entry routing through the shared onboarding evaluator.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::bridge::TokenResponse;
use crate::config::Settings;
use crate::error::AppError;
use crate::identity::oauth;
use crate::identity::{
    AuthProvider, HttpOAuthUpstream, LocalAuthProvider, LoginRequest, OAuthUpstream, SessionGrant, SessionHandle,
    SessionStore, StoreResolver, UserDirectory, REFRESH_COOKIE, SESSION_COOKIE,
};
use crate::onboarding::{RedirectPolicy, ServerEntry, WorkspaceDirectory};

pub mod api;
pub mod backend;
pub mod middleware;
pub mod pages;

/// Shared handler state. Every store is explicitly constructed and cloned in; nothing
/// is read from process globals.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub users: UserDirectory,
    pub sessions: SessionStore,
    pub workspaces: WorkspaceDirectory,
    pub resolver: StoreResolver,
    pub auth: Arc<dyn AuthProvider>,
    pub oauth: Arc<dyn OAuthUpstream>,
    pub entry: ServerEntry,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let authorize_url = match settings.oauth_authorize_url.as_deref() {
            Some(raw) => Some(Url::parse(raw).with_context(|| format!("invalid OAuth authorize URL: {raw}"))?),
            None => None,
        };
        let upstream = HttpOAuthUpstream::new(authorize_url, reqwest::Client::new());
        Self::with_oauth(settings, Arc::new(upstream))
    }

    pub fn with_oauth(settings: Settings, oauth: Arc<dyn OAuthUpstream>) -> anyhow::Result<Self> {
        settings.validate().context("invalid page paths")?;
        let users = UserDirectory::new();
        let sessions = SessionStore::new(settings.access_ttl, settings.refresh_ttl);
        let resolver = StoreResolver::new(sessions.clone(), users.clone());
        let auth = Arc::new(LocalAuthProvider::new(users.clone(), sessions.clone()));
        let entry = ServerEntry::new(RedirectPolicy::from_settings(&settings));
        Ok(Self {
            settings: Arc::new(settings),
            users,
            sessions,
            workspaces: WorkspaceDirectory::new(),
            resolver,
            auth,
            oauth,
            entry,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let onboarding = state.settings.onboarding_path.clone();
    let workspace_page = format!("{}/{{id}}", state.settings.workspace_prefix.trim_end_matches('/'));
    Router::new()
        .route("/", get(|| async { "workgate ok" }))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/auth/session", get(session_lookup))
        .route("/auth/refresh", post(refresh))
        .route("/auth/oauth", get(oauth_initiate))
        .route("/app", get(pages::entry))
        .route(&onboarding, get(pages::entry))
        .route(&workspace_page, get(pages::entry))
        .merge(api::routes(state.clone()))
        .merge(backend::routes())
        .with_state(state)
}

/// Serve on an already bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run_with_settings(settings: Settings) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", settings.http_port).parse()?;
    let state = AppState::new(settings)?;
    info!(target: "server", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("While binding HTTP listener on {}", addr))?;
    serve(listener, state).await
}

/// Convenience entry point using settings from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_settings(Settings::from_env()).await
}

fn cookie(settings: &Settings, name: &str, value: &str, max_age_secs: u64) -> Option<HeaderValue> {
    let secure = if settings.secure_cookies { " Secure;" } else { "" };
    HeaderValue::from_str(&format!("{name}={value}; HttpOnly;{secure} SameSite=Strict; Path=/; Max-Age={max_age_secs}")).ok()
}

fn clear_cookie(settings: &Settings, name: &str) -> Option<HeaderValue> {
    let secure = if settings.secure_cookies { " Secure;" } else { "" };
    HeaderValue::from_str(&format!(
        "{name}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly;{secure} SameSite=Strict; Path=/"
    ))
    .ok()
}

pub(crate) fn session_cookies(settings: &Settings, grant: &SessionGrant) -> HeaderMap {
    let mut h = HeaderMap::new();
    let pairs = [
        (SESSION_COOKIE, grant.access_token.as_str(), settings.access_ttl.as_secs()),
        (REFRESH_COOKIE, grant.refresh_token.as_str(), settings.refresh_ttl.as_secs()),
    ];
    for (name, value, max_age) in pairs {
        if let Some(v) = cookie(settings, name, value, max_age) {
            h.append(header::SET_COOKIE, v);
        }
    }
    h
}

fn cleared_cookies(settings: &Settings) -> HeaderMap {
    let mut h = HeaderMap::new();
    for name in [SESSION_COOKIE, REFRESH_COOKIE] {
        if let Some(v) = clear_cookie(settings, name) {
            h.append(header::SET_COOKIE, v);
        }
    }
    h
}

#[derive(Debug, Deserialize)]
struct SignupPayload {
    email: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginPayload { email: String, password: String }

#[derive(Debug, Default, Deserialize)]
struct RefreshPayload {
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthQuery {
    #[serde(default)]
    provider: Option<String>,
}

async fn signup(State(state): State<AppState>, Json(payload): Json<SignupPayload>) -> Response {
    let password = payload.password.as_deref().filter(|p| !p.is_empty());
    let user = match state.users.create(&payload.email, payload.name.as_deref(), password) {
        Ok(u) => u,
        Err(e) => {
            let err = match e.to_string().as_str() {
                "email_taken" => AppError::conflict("email_taken", "An account with this email already exists"),
                "email_required" => AppError::user("email_required", "Email is required"),
                _ => AppError::from(e),
            };
            return err.into_response();
        }
    };
    let grant = match state.sessions.issue(&user.id) {
        Ok(g) => g,
        Err(e) => {
            warn!(target: "server", "session issue failed: {e}");
            return AppError::internal("internal_error", "Could not start a session").into_response();
        }
    };
    (StatusCode::CREATED, session_cookies(&state.settings, &grant), Json(json!({"status": "ok", "user": user})))
        .into_response()
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> Response {
    match state.auth.login(&LoginRequest { email: payload.email, password: payload.password }) {
        Ok(resp) => {
            (StatusCode::OK, session_cookies(&state.settings, &resp.session), Json(json!({"status": "ok", "user": resp.user})))
                .into_response()
        }
        Err(e) if e.to_string() == "invalid_credentials" => {
            warn!(target: "server", "login rejected: {e}");
            AppError::auth("invalid_credentials", "Invalid email or password").into_response()
        }
        Err(e) => {
            warn!(target: "server", "login failed: {e}");
            AppError::internal("internal_error", "Could not start a session").into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let handle = SessionHandle::from_headers(&headers);
    let revoked = [handle.access.as_deref(), handle.refresh.as_deref()]
        .into_iter()
        .flatten()
        .any(|t| state.sessions.revoke(t));
    if revoked {
        info!(target: "server", "session revoked on logout");
    }
    (StatusCode::OK, cleared_cookies(&state.settings), Json(json!({"status": "ok"}))).into_response()
}

async fn session_lookup(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let handle = SessionHandle::from_headers(&headers);
    match state.resolver.lookup(&handle) {
        Some(lookup) => (StatusCode::OK, Json(lookup)).into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"error": "Not authenticated"}))).into_response(),
    }
}

/// Rotate both credentials. The refresh credential comes from the JSON body, or the
/// refresh cookie when the body does not carry one.
async fn refresh(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let payload: RefreshPayload = if body.is_empty() {
        RefreshPayload::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(p) => p,
            Err(_) => return AppError::user("invalid_body", "Expected a JSON body").into_response(),
        }
    };
    let presented = payload.refresh_token.or_else(|| SessionHandle::from_headers(&headers).refresh);
    let rotated = match presented.as_deref().map(|t| state.sessions.refresh(t)).transpose() {
        Ok(r) => r.flatten(),
        Err(e) => {
            warn!(target: "server", "credential rotation failed: {e}");
            return AppError::internal("internal_error", "Could not rotate credentials").into_response();
        }
    };
    let Some(grant) = rotated else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid refresh token"}))).into_response();
    };
    let body = TokenResponse {
        access_token: grant.access_token.clone(),
        refresh_token: grant.refresh_token.clone(),
        token_type: "bearer".to_string(),
        expires_in: (grant.access_expires_at - chrono::Utc::now()).num_seconds().max(0),
    };
    (StatusCode::OK, session_cookies(&state.settings, &grant), Json(body)).into_response()
}

async fn oauth_initiate(
    State(state): State<AppState>,
    query: Result<Query<OAuthQuery>, QueryRejection>,
) -> Redirect {
    let provider = match query {
        Ok(Query(q)) => q.provider,
        Err(e) => {
            warn!(target: "server", "oauth query rejected: {e}");
            return Redirect::to(&state.settings.sign_in_with_error(oauth::INVALID_PROVIDER));
        }
    };
    let redirect_to = format!("{}/auth/callback", state.settings.base_url.trim_end_matches('/'));
    match oauth::initiate(state.oauth.as_ref(), provider.as_deref(), &redirect_to).await {
        Ok(url) => Redirect::to(url.as_str()),
        Err(e) => Redirect::to(&state.settings.sign_in_with_error(e.code_str())),
    }
}
