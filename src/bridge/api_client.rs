//! Backend API client behind the session bridge.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, AuthFailure};
use crate::onboarding::MembershipSource;

use super::session_bridge::SessionBridge;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self { Self { method: Method::GET, path: path.into(), body: None } }
    pub fn post(path: impl Into<String>, body: Value) -> Self { Self { method: Method::POST, path: path.into(), body: Some(body) } }
    pub fn patch(path: impl Into<String>, body: Value) -> Self { Self { method: Method::PATCH, path: path.into(), body: Some(body) } }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn send(&self, req: &ApiRequest, bearer: &str) -> Result<ApiResponse, ApiError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base: Url, client: reqwest::Client) -> Self { Self { base, client } }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn send(&self, req: &ApiRequest, bearer: &str) -> Result<ApiResponse, ApiError> {
        let url = self.base.join(&req.path).map_err(|e| ApiError::Transport(format!("bad path {}: {e}", req.path)))?;
        let mut builder = self.client.request(req.method.clone(), url).bearer_auth(bearer);
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { status, body })
    }
}

fn into_result(resp: ApiResponse) -> Result<Value, ApiError> {
    if (200..300).contains(&resp.status) {
        Ok(resp.body)
    } else {
        Err(ApiError::Rejected { status: resp.status, body: resp.body.to_string() })
    }
}

/// Attaches the bridge's bearer and applies the single-retry refresh rule on 401.
pub struct ApiClient<T: ApiTransport = HttpTransport> {
    bridge: Arc<SessionBridge>,
    transport: T,
}

impl<T: ApiTransport> ApiClient<T> {
    pub fn new(bridge: Arc<SessionBridge>, transport: T) -> Self { Self { bridge, transport } }

    pub fn bridge(&self) -> &Arc<SessionBridge> { &self.bridge }

    pub async fn call(&self, req: ApiRequest) -> Result<Value, ApiError> {
        let (bearer, generation) = self.bridge.snapshot()?;
        let first = self.transport.send(&req, &bearer).await?;
        if first.status != 401 {
            return into_result(first);
        }
        debug!(target: "bridge", method = %req.method, path = %req.path, "backend rejected credential");
        self.bridge.recover_from_rejection(generation).await?;

        let (bearer, _) = self.bridge.snapshot()?;
        let second = self.transport.send(&req, &bearer).await?;
        if second.status == 401 {
            warn!(target: "bridge", path = %req.path, "rejected again after refresh");
            return Err(AuthFailure::Unauthenticated.into());
        }
        into_result(second)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> { self.call(ApiRequest::get(path)).await }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> { self.call(ApiRequest::post(path, body)).await }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value, ApiError> { self.call(ApiRequest::patch(path, body)).await }
}

/// Membership count from `GET /v1/workspaces` on the backend.
pub struct HttpMembershipSource<T: ApiTransport = HttpTransport> {
    client: Arc<ApiClient<T>>,
}

impl<T: ApiTransport> HttpMembershipSource<T> {
    pub fn new(client: Arc<ApiClient<T>>) -> Self { Self { client } }
}

#[async_trait]
impl<T: ApiTransport> MembershipSource for HttpMembershipSource<T> {
    async fn membership_count(&self) -> Result<u64, ApiError> {
        match self.client.get("/v1/workspaces").await? {
            Value::Array(items) => Ok(items.len() as u64),
            other => Err(ApiError::Transport(format!("unexpected workspace list: {other}"))),
        }
    }
}
