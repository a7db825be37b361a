//! Server-rendered entry adapter. Inputs are already loaded when a request is served,
//! so the decision is synchronous; it runs the same evaluator and policy as the client guard.

use serde::Serialize;

use crate::identity::Resolution;

use super::evaluator::{completion, CompletionState};
use super::policy::RedirectPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum EntryDecision {
    /// No principal; the sign-in gate handles the request.
    SignIn,
    Redirect { to: String },
    Render { completion: CompletionState },
}

#[derive(Debug, Clone, Default)]
pub struct ServerEntry {
    policy: RedirectPolicy,
}

impl ServerEntry {
    pub fn new(policy: RedirectPolicy) -> Self { Self { policy } }

    pub fn policy(&self) -> &RedirectPolicy { &self.policy }

    pub fn decide(
        &self,
        resolution: &Resolution,
        membership_count: u64,
        first_workspace: Option<&str>,
        current_path: &str,
    ) -> EntryDecision {
        let Some(principal) = resolution.principal() else {
            return EntryDecision::SignIn;
        };
        let state = completion(principal, membership_count);
        let settled_here = match &state {
            CompletionState::Incomplete(_) => self.policy.is_at_onboarding(current_path),
            CompletionState::Complete => self.policy.is_workspace_page(current_path),
        };
        let target = if settled_here {
            None
        } else {
            self.policy
                .select_destination(&state, first_workspace)
                .and_then(|to| self.policy.navigation_target(current_path, &to))
        };
        match target {
            Some(to) => EntryDecision::Redirect { to },
            None => EntryDecision::Render { completion: state },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Principal;
    use crate::onboarding::evaluator::Requirement;

    fn authed(credential_set: bool, name: &str) -> Resolution {
        Resolution::Authenticated(Principal {
            id: "u1".into(),
            email: "u1@example.com".into(),
            display_name: Some(name.into()),
            credential_set,
            avatar_url: None,
        })
    }

    #[test]
    fn fresh_user_goes_to_onboarding() {
        let entry = ServerEntry::default();
        assert_eq!(entry.decide(&authed(false, ""), 0, None, "/app"), EntryDecision::Redirect { to: "/onboarding".into() });
    }

    #[test]
    fn complete_user_goes_to_their_workspace() {
        let entry = ServerEntry::default();
        let d = entry.decide(&authed(true, "Ada"), 1, Some("w1"), "/app");
        assert_eq!(d, EntryDecision::Redirect { to: "/workspaces/w1".into() });
        let d = entry.decide(&authed(true, "Ada"), 1, Some("w1"), "/onboarding");
        assert_eq!(d, EntryDecision::Redirect { to: "/workspaces/w1".into() });
    }

    #[test]
    fn no_loops_at_destination() {
        let entry = ServerEntry::default();
        let d = entry.decide(&authed(true, ""), 1, Some("w1"), "/onboarding/profile");
        let EntryDecision::Render { completion } = d else { panic!("expected render, got {d:?}") };
        assert_eq!(completion.missing(), vec![Requirement::NameMissing]);

        let d = entry.decide(&authed(true, "Ada"), 2, Some("w1"), "/workspaces/w2");
        assert_eq!(d, EntryDecision::Render { completion: CompletionState::Complete });
    }

    #[test]
    fn incomplete_on_workspace_page_is_sent_to_onboarding() {
        let entry = ServerEntry::default();
        let d = entry.decide(&authed(false, "Ada"), 1, Some("w1"), "/workspaces/w1");
        assert_eq!(d, EntryDecision::Redirect { to: "/onboarding".into() });
    }

    #[test]
    fn complete_without_known_workspace_renders() {
        let entry = ServerEntry::default();
        let d = entry.decide(&authed(true, "Ada"), 1, None, "/app");
        assert_eq!(d, EntryDecision::Render { completion: CompletionState::Complete });
    }

    #[test]
    fn unauthenticated_defers_to_sign_in() {
        assert_eq!(ServerEntry::default().decide(&Resolution::Unauthenticated, 3, Some("w1"), "/app"), EntryDecision::SignIn);
    }
}
