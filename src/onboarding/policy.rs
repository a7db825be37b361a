//! Redirect destinations and the loop-freedom rule shared by both entry adapters.

use crate::config::Settings;

use super::evaluator::CompletionState;

/// Path component of a location: query and fragment dropped, trailing slash trimmed.
pub fn path_of(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = &location[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPolicy {
    pub onboarding_path: String,
    pub workspace_prefix: String,
}

impl RedirectPolicy {
    pub fn new(onboarding_path: impl Into<String>, workspace_prefix: impl Into<String>) -> Self {
        Self { onboarding_path: onboarding_path.into(), workspace_prefix: workspace_prefix.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.onboarding_path.clone(), settings.workspace_prefix.clone())
    }

    /// True for the onboarding path itself and anything nested below it.
    pub fn is_at_onboarding(&self, current: &str) -> bool {
        let base = path_of(&self.onboarding_path);
        let cur = path_of(current);
        cur == base || cur.strip_prefix(base).map(|rest| rest.starts_with('/')).unwrap_or(false)
    }

    pub fn is_workspace_page(&self, current: &str) -> bool {
        let base = path_of(&self.workspace_prefix);
        path_of(current).strip_prefix(base).map(|rest| rest.len() > 1 && rest.starts_with('/')).unwrap_or(false)
    }

    pub fn workspace_page(&self, workspace_id: &str) -> String {
        format!("{}/{}", path_of(&self.workspace_prefix), workspace_id)
    }

    /// Onboarding if any requirement is unmet, else the given workspace's page.
    /// `None` when complete but no workspace is known yet.
    pub fn select_destination(&self, state: &CompletionState, first_workspace: Option<&str>) -> Option<String> {
        match state {
            CompletionState::Incomplete(_) => Some(self.onboarding_path.clone()),
            CompletionState::Complete => first_workspace.map(|id| self.workspace_page(id)),
        }
    }

    /// Filter a navigation so it never targets the current location.
    pub fn navigation_target(&self, current: &str, target: &str) -> Option<String> {
        if path_of(current) == path_of(target) { None } else { Some(target.to_string()) }
    }
}

impl Default for RedirectPolicy {
    fn default() -> Self { Self::from_settings(&Settings::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::evaluator::Requirement;

    #[test]
    fn onboarding_prefix_is_segment_aware() {
        let p = RedirectPolicy::default();
        assert!(p.is_at_onboarding("/onboarding"));
        assert!(p.is_at_onboarding("/onboarding/"));
        assert!(p.is_at_onboarding("/onboarding/profile?step=2"));
        assert!(p.is_at_onboarding("/onboarding#top"));
        assert!(!p.is_at_onboarding("/onboarding-faq"));
        assert!(!p.is_at_onboarding("/"));
        assert!(!p.is_at_onboarding("/workspaces/onboarding"));
    }

    #[test]
    fn destination_selection() {
        let p = RedirectPolicy::default();
        let incomplete = CompletionState::Incomplete([Requirement::NameMissing].into_iter().collect());
        assert_eq!(p.select_destination(&incomplete, Some("w1")).as_deref(), Some("/onboarding"));
        assert_eq!(p.select_destination(&CompletionState::Complete, Some("w1")).as_deref(), Some("/workspaces/w1"));
        assert_eq!(p.select_destination(&CompletionState::Complete, None), None);
    }

    #[test]
    fn never_navigates_to_current_location() {
        let p = RedirectPolicy::default();
        assert_eq!(p.navigation_target("/onboarding?x=1", "/onboarding"), None);
        assert_eq!(p.navigation_target("/workspaces/w1/", "/workspaces/w1"), None);
        assert_eq!(p.navigation_target("/", "/onboarding").as_deref(), Some("/onboarding"));
    }

    #[test]
    fn workspace_pages() {
        let p = RedirectPolicy::default();
        assert!(p.is_workspace_page("/workspaces/abc"));
        assert!(!p.is_workspace_page("/workspaces"));
        assert!(!p.is_workspace_page("/workspaces/"));
        assert_eq!(path_of(""), "/");
    }
}
