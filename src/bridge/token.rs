use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::SessionLookup;

/// Bearer credentials for the backend API. Only the session bridge holds one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into(), expires_at }
    }

    pub fn expires_at(&self) -> DateTime<Utc> { self.expires_at }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }

    pub(crate) fn access(&self) -> &str { &self.access_token }

    pub(crate) fn refresh(&self) -> &str { &self.refresh_token }
}

impl From<SessionLookup> for SessionToken {
    fn from(l: SessionLookup) -> Self { Self::new(l.access_token, l.refresh_token, l.expires_at) }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
