//! Per-mount onboarding guard.
//!
//! [`Guard`] is the synchronous state machine: it holds the two inputs, decides once,
//! and stays terminal until explicitly invalidated. [`ClientGuard`] drives it from
//! async fetches, discarding late results after unmount.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::identity::{IdentityResolver, Resolution, SessionHandle};

use super::evaluator::{completion, evaluate, CompletionState, Evaluation};
use super::membership::MembershipSource;
use super::policy::RedirectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Redirecting,
    Settled,
}

/// A definitive membership answer. Transport failures are not answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipInput {
    Count(u64),
    Unauthenticated,
}

#[derive(Debug, Clone)]
pub struct Guard {
    policy: RedirectPolicy,
    state: GuardState,
    principal: Option<Resolution>,
    membership: Option<MembershipInput>,
    mounted: bool,
    navigations: u32,
}

impl Guard {
    pub fn new(policy: RedirectPolicy) -> Self {
        Self { policy, state: GuardState::Checking, principal: None, membership: None, mounted: true, navigations: 0 }
    }

    pub fn state(&self) -> GuardState { self.state }

    pub fn is_mounted(&self) -> bool { self.mounted }

    /// Navigations issued over the lifetime of this mount.
    pub fn navigations(&self) -> u32 { self.navigations }

    pub fn principal_loaded(&mut self, resolution: Resolution) {
        if self.mounted { self.principal = Some(resolution); }
    }

    pub fn membership_loaded(&mut self, input: MembershipInput) {
        if self.mounted { self.membership = Some(input); }
    }

    /// Verdict over the current inputs, recomputed on every call. Unauthenticated or
    /// partially loaded inputs give `Pending`.
    pub fn evaluation(&self) -> Evaluation {
        let principal = self.principal.as_ref().and_then(Resolution::principal);
        let count = match self.membership {
            Some(MembershipInput::Count(n)) => Some(n),
            _ => None,
        };
        evaluate(principal, count)
    }

    /// Attempt the single decision of this mount. Returns the navigation to perform, if any.
    /// Only acts while `Checking`; terminal states return `None` until [`Guard::invalidate`].
    pub fn step(&mut self, current_path: &str) -> Option<String> {
        if !self.mounted || self.state != GuardState::Checking {
            return None;
        }
        let (Some(resolution), Some(membership)) = (&self.principal, self.membership) else {
            return None;
        };
        let (Resolution::Authenticated(principal), MembershipInput::Count(count)) = (resolution, membership) else {
            // Sign-in gating belongs to another gate; do not race it.
            self.state = GuardState::Settled;
            return None;
        };
        match completion(principal, count) {
            CompletionState::Complete => {
                self.state = GuardState::Settled;
                None
            }
            CompletionState::Incomplete(missing) => {
                let target = if self.policy.is_at_onboarding(current_path) {
                    None
                } else {
                    self.policy.navigation_target(current_path, &self.policy.onboarding_path)
                };
                match target {
                    Some(to) => {
                        debug!(target: "guard", ?missing, from = current_path, to = %to, "onboarding incomplete, redirecting");
                        self.state = GuardState::Redirecting;
                        self.navigations += 1;
                        Some(to)
                    }
                    None => {
                        self.state = GuardState::Settled;
                        None
                    }
                }
            }
        }
    }

    /// Explicit cache invalidation of both inputs: back to `Checking`.
    pub fn invalidate(&mut self) {
        self.invalidate_principal();
        self.invalidate_membership();
    }

    pub fn invalidate_principal(&mut self) {
        if self.mounted {
            self.principal = None;
            self.state = GuardState::Checking;
        }
    }

    pub fn invalidate_membership(&mut self) {
        if self.mounted {
            self.membership = None;
            self.state = GuardState::Checking;
        }
    }

    pub fn unmount(&mut self) { self.mounted = false; }
}

/// Client-side navigation side effect.
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: &str);
}

/// Lifetime of the view owning a guard. Cloning shares the same scope.
#[derive(Clone)]
pub struct MountScope {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for MountScope {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl MountScope {
    pub fn new() -> Self { Self::default() }

    pub fn unmount(&self) { self.tx.send_replace(true); }

    pub fn is_mounted(&self) -> bool { !*self.tx.borrow() }

    /// Resolves once the scope is unmounted.
    pub async fn unmounted(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|gone| *gone).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The one navigation of this mount was issued.
    Redirected(String),
    /// Decided with no navigation.
    Settled,
    /// Already terminal; nothing re-evaluated into a navigation.
    Idle,
    /// Inputs did not both produce an answer; no decision taken.
    Undecided,
    /// The view went away before both inputs settled.
    Abandoned,
}

/// Async adapter: fetches principal and membership concurrently and applies the guard.
pub struct ClientGuard {
    resolver: Arc<dyn IdentityResolver>,
    membership: Arc<dyn MembershipSource>,
    navigator: Arc<dyn Navigator>,
    guard: Mutex<Guard>,
    scope: MountScope,
}

impl ClientGuard {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        membership: Arc<dyn MembershipSource>,
        navigator: Arc<dyn Navigator>,
        policy: RedirectPolicy,
    ) -> Self {
        Self { resolver, membership, navigator, guard: Mutex::new(Guard::new(policy)), scope: MountScope::new() }
    }

    pub fn scope(&self) -> MountScope { self.scope.clone() }

    pub fn state(&self) -> GuardState { self.guard.lock().state() }

    pub fn evaluation(&self) -> Evaluation { self.guard.lock().evaluation() }

    pub fn navigations(&self) -> u32 { self.guard.lock().navigations() }

    pub async fn run(&self, handle: &SessionHandle, current_path: &str) -> GuardOutcome {
        if !self.scope.is_mounted() {
            return GuardOutcome::Abandoned;
        }
        if self.state() != GuardState::Checking {
            return GuardOutcome::Idle;
        }
        let fetch = async { tokio::join!(self.resolver.resolve(handle), self.membership.membership_count()) };
        let (resolution, count) = tokio::select! {
            biased;
            _ = self.scope.unmounted() => {
                debug!(target: "guard", "unmounted before inputs settled");
                return GuardOutcome::Abandoned;
            }
            r = fetch => r,
        };

        // The decision is taken under the lock; the navigator runs after it is released
        // so it may call back into this guard.
        let to = {
            let mut guard = self.guard.lock();
            if !self.scope.is_mounted() || !guard.is_mounted() {
                return GuardOutcome::Abandoned;
            }
            if guard.state() != GuardState::Checking {
                return GuardOutcome::Idle;
            }
            guard.principal_loaded(resolution);
            match count {
                Ok(n) => guard.membership_loaded(MembershipInput::Count(n)),
                Err(e) if e.is_unauthenticated() => guard.membership_loaded(MembershipInput::Unauthenticated),
                Err(e) => warn!(target: "guard", "membership count unavailable: {e}"),
            }
            match guard.step(current_path) {
                Some(to) => to,
                None if guard.state() == GuardState::Checking => return GuardOutcome::Undecided,
                None => return GuardOutcome::Settled,
            }
        };
        info!(target: "guard", from = current_path, to = %to, "navigating");
        self.navigator.navigate(&to);
        GuardOutcome::Redirected(to)
    }

    /// Re-enter `Checking` after the principal or membership changed, then run again.
    pub async fn refresh(&self, handle: &SessionHandle, current_path: &str) -> GuardOutcome {
        self.guard.lock().invalidate();
        self.run(handle, current_path).await
    }

    pub fn unmount(&self) {
        self.scope.unmount();
        self.guard.lock().unmount();
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) { self.scope.unmount(); }
}
