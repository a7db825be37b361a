//! Cookie session to bearer credential bridge for the backend API.

mod token;
mod refresher;
mod session_bridge;
mod api_client;

pub use token::SessionToken;
pub use refresher::{HttpTokenRefresher, TokenRefresher, TokenResponse};
pub use session_bridge::SessionBridge;
pub use api_client::{ApiClient, ApiRequest, ApiResponse, ApiTransport, HttpMembershipSource, HttpTransport};
