use super::Principal;

/// Per-request identity attached by the protected API middleware.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn authenticated(principal: Principal) -> Self {
        Self { principal: Some(principal), request_id: Some(uuid::Uuid::new_v4().to_string()) }
    }
}
