use crate::error::AppError;
use crate::models::User;
use crate::services::store::UserDirectory;
use crate::state::AppState;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use crypto_core::jwt::{AuthError, JwtKeys};
use futures::future::LocalBoxFuture;

/// Verified identity carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaim {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Verifies bearer tokens signed with the server key. Stateless.
#[derive(Clone)]
pub struct TokenAuthenticator {
    keys: JwtKeys,
}

impl TokenAuthenticator {
    pub fn new(keys: JwtKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub fn verify(&self, token: &str) -> Result<AuthClaim, AuthError> {
        let claims = self.keys.verify(token)?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(AuthError::Malformed)?;
        Ok(AuthClaim {
            username: claims.sub,
            expires_at,
        })
    }

    /// Verify `token` and load the account it names.
    pub async fn resolve_current_user(
        &self,
        users: &dyn UserDirectory,
        token: &str,
    ) -> Result<User, AppError> {
        let claim = self.verify(token)?;
        users
            .find_by_username(&claim.username)
            .await?
            .ok_or(AppError::UnknownUser)
    }
}

/// Bearer token from the `token` query parameter, else from `Authorization: Bearer`.
pub fn bearer_token(req: &HttpRequest, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    header_token(req)
}

fn header_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Authenticated user for HTTP handlers, taken from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let token = header_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let state = state.ok_or(AppError::Internal)?;
            let token = token.ok_or(AppError::MissingToken)?;
            let user = state
                .authenticator
                .resolve_current_user(state.users.as_ref(), &token)
                .await?;
            Ok(CurrentUser(user))
        })
    }
}
