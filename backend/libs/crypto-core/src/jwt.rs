/// Bearer token signing and verification for the chat services.
///
/// Tokens are HMAC-signed JWTs whose `sub` claim carries the username. Keys are
/// held by an explicitly constructed [`JwtKeys`] value, built once at startup
/// from the server secret and shared through application state.
///
/// ## Usage
///
/// ```rust
/// use crypto_core::jwt::JwtKeys;
/// use chrono::Duration;
///
/// let keys = JwtKeys::from_secret(b"server-secret").unwrap();
/// let token = keys.issue("alice", Duration::minutes(30)).unwrap();
/// let claims = keys.verify(&token).unwrap();
/// assert_eq!(claims.sub, "alice");
/// ```
use std::{fmt, str::FromStr};

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const DEFAULT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried by a chat bearer token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
            _ => AuthError::Malformed,
        }
    }
}

/// Errors raised while building keys or minting tokens.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT secret must not be empty")]
    EmptySecret,
    #[error("unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Signing and verification keys for one HMAC secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    /// Build HS256 keys from a shared secret.
    pub fn from_secret(secret: &[u8]) -> Result<Self, JwtError> {
        Self::with_algorithm(secret, DEFAULT_ALGORITHM)
    }

    /// Build keys for a named HMAC algorithm (`HS256`, `HS384`, `HS512`).
    pub fn from_secret_and_algorithm(secret: &[u8], algorithm: &str) -> Result<Self, JwtError> {
        let algorithm = Algorithm::from_str(algorithm.trim())
            .map_err(|_| JwtError::UnsupportedAlgorithm(algorithm.to_string()))?;
        Self::with_algorithm(secret, algorithm)
    }

    fn with_algorithm(secret: &[u8], algorithm: Algorithm) -> Result<Self, JwtError> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(JwtError::UnsupportedAlgorithm(format!("{algorithm:?}")));
        }
        if secret.is_empty() {
            return Err(JwtError::EmptySecret);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            algorithm,
        })
    }

    /// Mint a token for `subject` valid for `ttl`.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, JwtError> {
        let now = Utc::now();
        self.sign(&Claims {
            sub: subject.to_string(),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
        })
    }

    /// Sign arbitrary claims, including already-expired ones.
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        Ok(encode(&Header::new(self.algorithm), claims, &self.encoding)?)
    }

    /// Verify the signature and expiry of `token`.
    ///
    /// Expiry is strict: a token whose `exp` equals the current second is
    /// already expired. The signature is checked before the claims, so a
    /// forged expired token reports `InvalidSignature`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Malformed);
        }

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::Malformed);
        }
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(data.claims)
    }
}
