//! Bearer-authenticated backend surface (`/v1`). The access credential issued with the
//! cookie session is the bearer; the session bridge attaches it.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::{Principal, ProfileUpdate, Resolution, UserRecord};
use crate::onboarding::completion;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/exchange", post(exchange))
        .route("/v1/auth/me", get(me).patch(update_me))
        .route("/v1/workspaces", get(list_workspaces).post(create_workspace))
}

fn credentials_rejected() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({"error": "Could not validate credentials"})),
    )
        .into_response()
}

fn bearer_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|s| !s.is_empty());
    match token.map(|t| state.resolver.resolve_bearer(t)) {
        Some(Resolution::Authenticated(p)) => Ok(p),
        _ => Err(credentials_rejected()),
    }
}

/// Exchange a bearer for the onboarding verdict and where the client should land.
async fn exchange(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match bearer_principal(&state, &headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let workspaces = state.workspaces.list_for(&principal.id);
    let verdict = completion(&principal, workspaces.len() as u64);
    let policy = state.entry.policy();
    let redirect_url = policy
        .select_destination(&verdict, workspaces.first().map(|w| w.id.as_str()))
        .unwrap_or_else(|| policy.onboarding_path.clone());
    info!(target: "server", user_id = %principal.id, complete = verdict.is_complete(), "auth.exchange");
    Json(json!({
        "user": principal,
        "onboarding_required": !verdict.is_complete(),
        "redirect_url": redirect_url,
        "missing": verdict.missing(),
        "onboarding": verdict,
    }))
    .into_response()
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match bearer_principal(&state, &headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.users.get(&principal.id) {
        Some(user) => Json(user).into_response(),
        None => credentials_rejected(),
    }
}

#[derive(Debug, Deserialize)]
struct ProfilePatch {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

async fn update_me(State(state): State<AppState>, headers: HeaderMap, Json(patch): Json<ProfilePatch>) -> Response {
    let principal = match bearer_principal(&state, &headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match apply_profile_patch(&state, &principal.id, patch) {
        Ok(user) => Json(user).into_response(),
        Err(e) => e.into_response(),
    }
}

fn apply_profile_patch(state: &AppState, user_id: &str, patch: ProfilePatch) -> AppResult<UserRecord> {
    if let Some(pw) = patch.password.as_deref() {
        if pw.is_empty() {
            return Err(AppError::user("password_required", "Password must not be empty"));
        }
        state
            .users
            .set_password(user_id, pw)
            .map_err(|e| match e.to_string().as_str() {
                "user_not_found" => AppError::not_found("user_not_found", "User not found"),
                _ => AppError::from(e),
            })?;
        info!(target: "server", user_id, "credential set");
    }
    let update = ProfileUpdate { name: patch.name, avatar_url: patch.avatar_url };
    state
        .users
        .update_profile(user_id, update)
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))
}

async fn list_workspaces(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match bearer_principal(&state, &headers) {
        Ok(p) => Json(state.workspaces.list_for(&p.id)).into_response(),
        Err(resp) => resp,
    }
}

#[derive(Debug, Deserialize)]
struct NewWorkspace { name: String }

async fn create_workspace(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<NewWorkspace>) -> Response {
    let principal = match bearer_principal(&state, &headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if body.name.trim().is_empty() {
        return AppError::user("name_required", "Workspace name is required").into_response();
    }
    let ws = state.workspaces.create(&principal.id, &body.name);
    info!(target: "server", user_id = %principal.id, workspace_id = %ws.id, "workspace created");
    (StatusCode::CREATED, Json(ws)).into_response()
}
