use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::tprintln;

/// One issued session: an opaque access credential for bearer calls and a longer lived
/// refresh credential that can be rotated for a fresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub session_id: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<String, SessionGrant>,
    by_access: HashMap<String, String>,
    by_refresh: HashMap<String, String>,
    user_index: HashMap<String, HashSet<String>>,
}

impl Tables {
    /// Credentials must be unique across live sessions; a repeat means the token source is broken.
    fn check_fresh(&self, grant: &SessionGrant) -> Result<()> {
        if self.sessions.contains_key(&grant.session_id)
            || self.by_access.contains_key(&grant.access_token)
            || self.by_refresh.contains_key(&grant.refresh_token)
            || grant.access_token == grant.refresh_token
        {
            bail!("session credential collision");
        }
        Ok(())
    }

    fn insert(&mut self, grant: SessionGrant) {
        self.by_access.insert(grant.access_token.clone(), grant.session_id.clone());
        self.by_refresh.insert(grant.refresh_token.clone(), grant.session_id.clone());
        self.user_index.entry(grant.user_id.clone()).or_default().insert(grant.session_id.clone());
        self.sessions.insert(grant.session_id.clone(), grant);
    }

    fn remove(&mut self, sid: &str) -> Option<SessionGrant> {
        let grant = self.sessions.remove(sid)?;
        self.by_access.remove(&grant.access_token);
        self.by_refresh.remove(&grant.refresh_token);
        if let Some(set) = self.user_index.get_mut(&grant.user_id) {
            set.remove(sid);
            if set.is_empty() { self.user_index.remove(&grant.user_id); }
        }
        Some(grant)
    }
}

pub(crate) fn gen_token() -> Result<String> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!("token entropy unavailable: {e}"))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

type Mint = fn() -> Result<String>;

fn ttl(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Server-side session table. Cloning shares the same table.
#[derive(Clone)]
pub struct SessionStore {
    tables: Arc<RwLock<Tables>>,
    mint: Mint,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60), Duration::from_secs(30 * 24 * 60 * 60)) }
}

impl SessionStore {
    pub fn new(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self { tables: Arc::new(RwLock::new(Tables::default())), mint: gen_token, access_ttl, refresh_ttl }
    }

    #[cfg(test)]
    fn with_mint(mut self, mint: Mint) -> Self {
        self.mint = mint;
        self
    }

    pub fn issue(&self, user_id: &str) -> Result<SessionGrant> {
        let now = Utc::now();
        self.issue_expiring_at(user_id, now + ttl(self.access_ttl))
    }

    /// Issue a session whose access credential expires at `access_expires_at`.
    /// Fails when no fresh random credentials can be minted; nothing is stored then.
    pub fn issue_expiring_at(&self, user_id: &str, access_expires_at: DateTime<Utc>) -> Result<SessionGrant> {
        let grant = SessionGrant {
            session_id: (self.mint)()?,
            user_id: user_id.to_string(),
            access_token: (self.mint)()?,
            refresh_token: (self.mint)()?,
            access_expires_at,
            refresh_expires_at: Utc::now() + ttl(self.refresh_ttl),
        };
        let mut t = self.tables.write();
        t.check_fresh(&grant)?;
        t.insert(grant.clone());
        tprintln!("session.issue user={} sid={} ttl_secs={}", user_id, grant.session_id, self.access_ttl.as_secs());
        Ok(grant)
    }

    pub fn validate_access(&self, token: &str) -> Option<SessionGrant> {
        let t = self.tables.read();
        let sid = t.by_access.get(token)?;
        let grant = t.sessions.get(sid)?;
        (grant.access_expires_at > Utc::now()).then(|| grant.clone())
    }

    pub fn validate_refresh(&self, token: &str) -> Option<SessionGrant> {
        let now = Utc::now();
        let mut drop_sid: Option<String> = None;
        let out = {
            let t = self.tables.read();
            let sid = t.by_refresh.get(token)?;
            let grant = t.sessions.get(sid)?;
            if grant.refresh_expires_at > now {
                Some(grant.clone())
            } else {
                drop_sid = Some(sid.clone());
                None
            }
        };
        if let Some(sid) = drop_sid {
            self.tables.write().remove(&sid);
        }
        out
    }

    /// Rotate both credentials of the session owning `refresh_token`. The presented
    /// refresh credential is consumed; reusing it fails. `Ok(None)` means the credential
    /// is unknown or expired; `Err` means no fresh credentials could be minted, in which
    /// case the old session is left as it was.
    pub fn refresh(&self, refresh_token: &str) -> Result<Option<SessionGrant>> {
        let now = Utc::now();
        let access_token = (self.mint)()?;
        let new_refresh = (self.mint)()?;
        let mut t = self.tables.write();
        let Some(sid) = t.by_refresh.get(refresh_token).cloned() else { return Ok(None) };
        let Some(old) = t.remove(&sid) else { return Ok(None) };
        if old.refresh_expires_at <= now {
            return Ok(None);
        }
        let grant = SessionGrant {
            session_id: old.session_id.clone(),
            user_id: old.user_id.clone(),
            access_token,
            refresh_token: new_refresh,
            access_expires_at: now + ttl(self.access_ttl),
            refresh_expires_at: now + ttl(self.refresh_ttl),
        };
        if let Err(e) = t.check_fresh(&grant) {
            t.insert(old);
            return Err(e);
        }
        t.insert(grant.clone());
        tprintln!("session.refresh user={} sid={}", grant.user_id, grant.session_id);
        Ok(Some(grant))
    }

    /// Revoke the session identified by either of its credentials.
    pub fn revoke(&self, token: &str) -> bool {
        let mut t = self.tables.write();
        let sid = t.by_access.get(token).or_else(|| t.by_refresh.get(token)).cloned();
        match sid {
            Some(sid) => t.remove(&sid).is_some(),
            None => false,
        }
    }

    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut t = self.tables.write();
        let sids: Vec<String> = t.user_index.get(user_id).map(|s| s.iter().cloned().collect()).unwrap_or_default();
        let count = sids.iter().filter(|sid| t.remove(sid).is_some()).count();
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }
}
