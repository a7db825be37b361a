//! Runtime settings for the workgate server and client adapters.
//!
//! Values come from `WORKGATE_*` environment variables with fixed defaults; the
//! server binary layers CLI flags on top (flags > env > defaults).

use std::env;
use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_ONBOARDING_PATH: &str = "/onboarding";
pub const DEFAULT_SIGN_IN_PATH: &str = "/sign-in";
pub const DEFAULT_WORKSPACE_PREFIX: &str = "/workspaces";

/// Paths the router serves itself; configurable page paths may not shadow them.
const RESERVED_PATHS: &[&str] = &["/app", "/api", "/auth", "/v1", "/signup", "/login", "/logout"];

/// A configurable page path must be absolute, literal and clear of the fixed routes.
fn check_page_path(what: &str, path: &str) -> Result<()> {
    let trimmed = path.trim_end_matches('/');
    if !path.starts_with('/') {
        bail!("{what} must start with '/': {path:?}");
    }
    if trimmed.is_empty() {
        bail!("{what} must not be the root path");
    }
    if path.contains(['{', '}', '*', '?', '#']) {
        bail!("{what} must be a literal path: {path:?}");
    }
    if let Some(r) = RESERVED_PATHS.iter().find(|r| trimmed == **r || trimmed.starts_with(&format!("{r}/"))) {
        bail!("{what} {path:?} collides with the built-in {r} routes");
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub http_port: u16,
    /// Externally visible origin, used for OAuth `redirect_to`.
    pub base_url: String,
    pub sign_in_path: String,
    pub onboarding_path: String,
    pub workspace_prefix: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Upper bound on a single token refresh round trip.
    pub refresh_timeout: Duration,
    /// Identity provider authorize endpoint; OAuth initiation fails with `oauth_failed` when unset.
    pub oauth_authorize_url: Option<String>,
    pub secure_cookies: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            base_url: format!("http://localhost:{}", DEFAULT_HTTP_PORT),
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            onboarding_path: DEFAULT_ONBOARDING_PATH.to_string(),
            workspace_prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
            access_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            refresh_timeout: Duration::from_secs(10),
            oauth_authorize_url: None,
            secure_cookies: true,
        }
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_u16(name: &str) -> Option<u16> {
    env_string(name).and_then(|v| v.parse::<u16>().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_string(name).and_then(|v| v.parse::<u64>().ok()).map(Duration::from_secs)
}

fn env_bool(name: &str) -> Option<bool> {
    env_string(name).and_then(|v| parse_bool(&v))
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        let http_port = env_u16("WORKGATE_HTTP_PORT").unwrap_or(defaults.http_port);
        let base_url = env_string("WORKGATE_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", http_port));
        Self {
            http_port,
            base_url,
            sign_in_path: env_string("WORKGATE_SIGN_IN_PATH").unwrap_or(defaults.sign_in_path),
            onboarding_path: env_string("WORKGATE_ONBOARDING_PATH").unwrap_or(defaults.onboarding_path),
            workspace_prefix: env_string("WORKGATE_WORKSPACE_PREFIX").unwrap_or(defaults.workspace_prefix),
            access_ttl: env_secs("WORKGATE_ACCESS_TTL_SECS").unwrap_or(defaults.access_ttl),
            refresh_ttl: env_secs("WORKGATE_REFRESH_TTL_SECS").unwrap_or(defaults.refresh_ttl),
            refresh_timeout: env_secs("WORKGATE_REFRESH_TIMEOUT_SECS").unwrap_or(defaults.refresh_timeout),
            oauth_authorize_url: env_string("WORKGATE_OAUTH_AUTHORIZE_URL"),
            secure_cookies: env_bool("WORKGATE_SECURE_COOKIES").unwrap_or(defaults.secure_cookies),
        }
    }

    /// Reject page paths the router could not mount.
    pub fn validate(&self) -> Result<()> {
        check_page_path("onboarding path", &self.onboarding_path)?;
        check_page_path("workspace prefix", &self.workspace_prefix)?;
        if self.onboarding_path.trim_end_matches('/') == self.workspace_prefix.trim_end_matches('/') {
            bail!("onboarding path and workspace prefix must differ");
        }
        Ok(())
    }

    /// Build the sign-in URL carrying a machine-readable error code.
    pub fn sign_in_with_error(&self, code: &str) -> String {
        format!("{}?error={}", self.sign_in_path, urlencoding::encode(code))
    }

    /// Build the sign-in URL that returns the user to `next` afterwards.
    pub fn sign_in_with_next(&self, next: &str) -> String {
        format!("{}?next={}", self.sign_in_path, urlencoding::encode(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for s in ["1", "true", "YES", " on "] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["0", "False", "no", "off"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn sign_in_urls_encode_their_argument() {
        let s = Settings::default();
        assert_eq!(s.sign_in_with_error("invalid_provider"), "/sign-in?error=invalid_provider");
        assert_eq!(s.sign_in_with_next("/workspaces/a b"), "/sign-in?next=%2Fworkspaces%2Fa%20b");
    }

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.http_port, 7878);
        assert_eq!(s.onboarding_path, "/onboarding");
        assert!(s.refresh_timeout < s.access_ttl);
        assert!(s.oauth_authorize_url.is_none());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn page_paths_must_be_mountable() {
        let bad = [
            ("onboarding", "/workspaces"),
            ("/", "/workspaces"),
            ("/app", "/workspaces"),
            ("/auth/onboarding", "/workspaces"),
            ("/onboarding", "/api"),
            ("/onboarding", "/w/{id}"),
            ("/onboarding", "/onboarding/"),
        ];
        for (onboarding, prefix) in bad {
            let s = Settings { onboarding_path: onboarding.into(), workspace_prefix: prefix.into(), ..Settings::default() };
            assert!(s.validate().is_err(), "{onboarding} {prefix}");
        }
        let ok = Settings { onboarding_path: "/welcome/".into(), workspace_prefix: "/apps".into(), ..Settings::default() };
        assert!(ok.validate().is_ok());
    }
}
