//! Identity, sessions and OAuth initiation for the workgate identity surface.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod resolver;
mod request_context;
pub mod oauth;

pub use principal::{Principal, UserRecord};
pub use session::{SessionGrant, SessionStore};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse, ProfileUpdate, UserDirectory};
pub use resolver::{
    HttpIdentityResolver, IdentityResolver, Resolution, SessionHandle, SessionLookup, StoreResolver,
    REFRESH_COOKIE, SESSION_COOKIE,
};
pub use request_context::RequestContext;
pub use oauth::{HttpOAuthUpstream, OAuthError, OAuthProvider, OAuthUpstream};
