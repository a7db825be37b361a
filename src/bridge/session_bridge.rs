//! Owner of the backend bearer credentials.
//!
//! The token slot is guarded by a short synchronous lock and stamped with a generation
//! that advances on every refresh outcome. Refreshes are serialized by a second, async
//! lock: a caller that waited on it and finds the generation already moved shares the
//! outcome of the refresh that ran instead of starting another.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::AuthFailure;
use crate::identity::SessionLookup;

use super::refresher::TokenRefresher;
use super::token::SessionToken;

#[derive(Debug, Default)]
struct Slot {
    token: Option<SessionToken>,
    generation: u64,
}

pub struct SessionBridge {
    slot: Mutex<Slot>,
    refresh_lock: tokio::sync::Mutex<()>,
    refresher: Arc<dyn TokenRefresher>,
    timeout: Duration,
    refresh_attempts: AtomicUsize,
}

impl SessionBridge {
    pub fn new(token: Option<SessionToken>, refresher: Arc<dyn TokenRefresher>, timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(Slot { token, generation: 0 }),
            refresh_lock: tokio::sync::Mutex::new(()),
            refresher,
            timeout,
            refresh_attempts: AtomicUsize::new(0),
        }
    }

    /// Seed from a session lookup reply.
    pub fn from_lookup(lookup: SessionLookup, refresher: Arc<dyn TokenRefresher>, timeout: Duration) -> Self {
        Self::new(Some(lookup.into()), refresher, timeout)
    }

    pub fn current_token(&self) -> Result<SessionToken, AuthFailure> {
        self.slot.lock().token.clone().ok_or(AuthFailure::Unauthenticated)
    }

    /// Access credential plus the generation it belongs to.
    pub(crate) fn snapshot(&self) -> Result<(String, u64), AuthFailure> {
        let slot = self.slot.lock();
        match &slot.token {
            Some(t) => Ok((t.access().to_string(), slot.generation)),
            None => Err(AuthFailure::Unauthenticated),
        }
    }

    pub fn generation(&self) -> u64 { self.slot.lock().generation }

    /// Refresh attempts actually sent to the refresher.
    pub fn refresh_attempts(&self) -> usize { self.refresh_attempts.load(Ordering::SeqCst) }

    /// Replace the held token, e.g. after an interactive sign-in.
    pub fn install(&self, token: SessionToken) {
        let mut slot = self.slot.lock();
        slot.token = Some(token);
        slot.generation += 1;
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.token = None;
        slot.generation += 1;
    }

    /// Recover after the backend rejected the access credential of `rejected_generation`.
    ///
    /// At most one refresh runs per generation; callers that lost the race observe its
    /// result. Refresh failure or timeout clears the token.
    pub async fn recover_from_rejection(&self, rejected_generation: u64) -> Result<(), AuthFailure> {
        let _flight = self.refresh_lock.lock().await;
        let refresh_token = {
            let slot = self.slot.lock();
            if slot.generation != rejected_generation {
                debug!(target: "bridge", generation = slot.generation, "refresh already settled by another caller");
                return if slot.token.is_some() { Ok(()) } else { Err(AuthFailure::RefreshFailed) };
            }
            match &slot.token {
                Some(t) => t.refresh().to_string(),
                None => return Err(AuthFailure::Unauthenticated),
            }
        };

        self.refresh_attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = match tokio::time::timeout(self.timeout, self.refresher.refresh(&refresh_token)).await {
            Ok(r) => r,
            Err(_) => {
                warn!(target: "bridge", timeout_ms = self.timeout.as_millis() as u64, "token refresh timed out");
                Err(AuthFailure::RefreshFailed)
            }
        };

        let mut slot = self.slot.lock();
        slot.generation += 1;
        match outcome {
            Ok(token) => {
                info!(target: "bridge", generation = slot.generation, expires_at = %token.expires_at(), "session token rotated");
                slot.token = Some(token);
                Ok(())
            }
            Err(e) => {
                warn!(target: "bridge", "token refresh failed: {e}; session cleared");
                slot.token = None;
                Err(AuthFailure::RefreshFailed)
            }
        }
    }
}
