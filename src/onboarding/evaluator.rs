//! Pure onboarding-completion verdict.
//!
//! `evaluate` is total: absent fields degrade to "missing", and an input that has not
//! loaded yet yields [`Evaluation::Pending`] rather than a guess.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    CredentialMissing,
    NameMissing,
    NoWorkspace,
}

impl Requirement {
    pub fn describe(&self) -> &'static str {
        match self {
            Requirement::CredentialMissing => "set a password",
            Requirement::NameMissing => "add your name",
            Requirement::NoWorkspace => "create or join a workspace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "missing", rename_all = "snake_case")]
pub enum CompletionState {
    Complete,
    Incomplete(BTreeSet<Requirement>),
}

impl CompletionState {
    pub fn is_complete(&self) -> bool { matches!(self, CompletionState::Complete) }

    /// Every unmet requirement, in declaration order.
    pub fn missing(&self) -> Vec<Requirement> {
        match self {
            CompletionState::Complete => Vec::new(),
            CompletionState::Incomplete(set) => set.iter().copied().collect(),
        }
    }

    /// Human summary listing all missing steps, e.g. for an onboarding checklist.
    pub fn summary(&self) -> Option<String> {
        match self {
            CompletionState::Complete => None,
            CompletionState::Incomplete(set) => {
                let steps: Vec<&str> = set.iter().map(Requirement::describe).collect();
                Some(format!("To finish setting up: {}", steps.join(", ")))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// At least one input has not loaded; no decision may be taken.
    Pending,
    Ready(CompletionState),
}

impl Evaluation {
    pub fn state(&self) -> Option<&CompletionState> {
        match self {
            Evaluation::Pending => None,
            Evaluation::Ready(s) => Some(s),
        }
    }
}

/// Compute the verdict for a loaded principal and a loaded membership count.
///
/// `None` means "not yet known". Unauthenticated principals never reach here.
pub fn evaluate(principal: Option<&Principal>, membership_count: Option<u64>) -> Evaluation {
    let (Some(p), Some(count)) = (principal, membership_count) else {
        return Evaluation::Pending;
    };
    Evaluation::Ready(completion(p, count))
}

/// Verdict for fully loaded inputs.
pub fn completion(principal: &Principal, membership_count: u64) -> CompletionState {
    let mut missing = BTreeSet::new();
    if !principal.credential_set {
        missing.insert(Requirement::CredentialMissing);
    }
    if principal.trimmed_name().is_none() {
        missing.insert(Requirement::NameMissing);
    }
    if membership_count == 0 {
        missing.insert(Requirement::NoWorkspace);
    }
    if missing.is_empty() { CompletionState::Complete } else { CompletionState::Incomplete(missing) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(credential_set: bool, name: Option<&str>) -> Principal {
        Principal {
            id: "u1".into(),
            email: "u1@example.com".into(),
            display_name: name.map(|s| s.to_string()),
            credential_set,
            avatar_url: None,
        }
    }

    #[test]
    fn nothing_done_lists_every_requirement() {
        let v = evaluate(Some(&principal(false, Some(""))), Some(0));
        let expected: BTreeSet<_> =
            [Requirement::CredentialMissing, Requirement::NameMissing, Requirement::NoWorkspace].into_iter().collect();
        assert_eq!(v, Evaluation::Ready(CompletionState::Incomplete(expected)));
    }

    #[test]
    fn everything_done_is_complete() {
        assert_eq!(evaluate(Some(&principal(true, Some("Ada"))), Some(1)), Evaluation::Ready(CompletionState::Complete));
    }

    #[test]
    fn either_input_missing_is_pending() {
        let p = principal(true, Some("Ada"));
        assert_eq!(evaluate(None, Some(3)), Evaluation::Pending);
        assert_eq!(evaluate(Some(&p), None), Evaluation::Pending);
        assert_eq!(evaluate(None, None), Evaluation::Pending);
    }

    #[test]
    fn completion_matches_the_conjunction_for_all_combinations() {
        let names = [None, Some(""), Some("  \t"), Some("Ada"), Some(" Grace ")];
        for cred in [false, true] {
            for name in names {
                for count in [0u64, 1, 7] {
                    let p = principal(cred, name);
                    let expect_complete = cred && name.map(|n| !n.trim().is_empty()).unwrap_or(false) && count > 0;
                    let state = completion(&p, count);
                    assert_eq!(state.is_complete(), expect_complete, "cred={cred} name={name:?} count={count}");
                    let missing = state.missing();
                    assert_eq!(missing.contains(&Requirement::CredentialMissing), !cred);
                    assert_eq!(missing.contains(&Requirement::NoWorkspace), count == 0);
                }
            }
        }
    }

    #[test]
    fn summary_enumerates_all_missing_steps() {
        let s = completion(&principal(false, None), 0).summary().unwrap();
        assert!(s.contains("set a password"));
        assert!(s.contains("add your name"));
        assert!(s.contains("create or join a workspace"));
        assert_eq!(completion(&principal(true, Some("Ada")), 2).summary(), None);
    }
}
