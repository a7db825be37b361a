//! Protected API middleware: a recognised session cookie (primary or refresh variant)
//! is required and resolved before any `/api` handler runs.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use crate::identity::{IdentityResolver, RequestContext, Resolution, SessionHandle};

use super::AppState;

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response()
}

pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let handle = SessionHandle::from_headers(req.headers());
    if handle.is_empty() {
        return unauthorized();
    }
    match state.resolver.resolve(&handle).await {
        Resolution::Authenticated(principal) => {
            let ctx = RequestContext::authenticated(principal);
            debug!(target: "server", request_id = ctx.request_id.as_deref().unwrap_or(""), path = %req.uri().path(), "session accepted");
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Resolution::Unauthenticated => unauthorized(),
    }
}
