//! Server-rendered entry routes. The sign-in gate runs first; the onboarding decision is
//! delegated to [`ServerEntry`](crate::onboarding::ServerEntry).

use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use crate::identity::SessionHandle;
use crate::onboarding::EntryDecision;

use super::AppState;

pub async fn entry(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let current = uri.path();
    let resolution = state.resolver.resolve_now(&SessionHandle::from_headers(&headers));
    let Some(principal) = resolution.principal() else {
        return Redirect::to(&state.settings.sign_in_with_next(current)).into_response();
    };
    let workspaces = state.workspaces.list_for(&principal.id);
    let first = workspaces.first().map(|w| w.id.as_str());
    match state.entry.decide(&resolution, workspaces.len() as u64, first, current) {
        EntryDecision::SignIn => Redirect::to(&state.settings.sign_in_with_next(current)).into_response(),
        EntryDecision::Redirect { to } => {
            debug!(target: "server", from = current, to = %to, "entry redirect");
            Redirect::to(&to).into_response()
        }
        EntryDecision::Render { completion } => {
            let steps: Vec<&str> = completion.missing().iter().map(|r| r.describe()).collect();
            Json(json!({
                "path": current,
                "user": principal,
                "onboarding": completion,
                "steps": steps,
                "summary": completion.summary(),
                "workspaces": workspaces,
            }))
            .into_response()
        }
    }
}
