pub mod auth;
pub mod error_handling;
pub mod logging;

pub use auth::{bearer_token, AuthClaim, CurrentUser, TokenAuthenticator};
pub use logging::RequestLogging;
