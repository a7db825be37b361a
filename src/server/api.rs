use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use serde_json::json;

use crate::identity::RequestContext;
use crate::onboarding::completion;

use super::middleware::require_session;
use super::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/workspaces/count", get(workspace_count))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

async fn me(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Response {
    let Some(principal) = ctx.principal else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
    };
    let verdict = completion(&principal, state.workspaces.count_for(&principal.id));
    Json(json!({
        "user": principal,
        "onboarding": verdict,
        "request_id": ctx.request_id,
    }))
    .into_response()
}

async fn workspace_count(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Response {
    let Some(principal) = ctx.principal else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
    };
    Json(json!({"count": state.workspaces.count_for(&principal.id)})).into_response()
}
