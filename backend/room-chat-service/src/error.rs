use crate::middleware::error_handling;
use crate::services::store::StoreError;
use actix_web::{HttpResponse, ResponseError};
use crypto_core::jwt::AuthError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Input that failed shape or range checks. Never fatal to a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub const INVALID_PAYLOAD: &'static str = "Invalid message payload";

    pub fn invalid_payload(issues: Vec<ValidationIssue>) -> Self {
        Self {
            message: Self::INVALID_PAYLOAD.to_string(),
            issues,
        }
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self::invalid_payload(vec![ValidationIssue::new(field, message)])
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut issues: Vec<ValidationIssue> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    ValidationIssue::new(field.to_string(), message)
                })
            })
            .collect();
        issues.sort_by(|a, b| a.field.cmp(&b.field));
        Self::invalid_payload(issues)
    }
}

/// Failures of the validate → encrypt → persist → decrypt pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("decryption failed for message {message_id}: {reason}")]
    Decryption { message_id: i64, reason: String },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("missing bearer token")]
    MissingToken,

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("unknown user")]
    UnknownUser,

    #[error("room not found")]
    RoomNotFound,

    #[error("database error: {0}")]
    Database(#[from] StoreError),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("internal server error")]
    Internal,
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => AppError::Validation(e),
            PipelineError::Encryption(e) => AppError::Encryption(e),
            PipelineError::Persistence(e) => AppError::Database(e),
            e @ PipelineError::Decryption { .. } => AppError::Decryption(e.to_string()),
        }
    }
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => 400,
            AppError::MissingToken | AppError::Auth(_) | AppError::UnknownUser => 401,
            AppError::RoomNotFound => 404,
            AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Database(_)
            | AppError::Encryption(_)
            | AppError::Decryption(_)
            | AppError::Internal => 500,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(AppError::status_code(self))
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "must not be empty"))]
        content: String,
    }

    #[test]
    fn validator_errors_become_issues() {
        let err = Probe { content: String::new() }.validate().unwrap_err();
        let err = ValidationError::from(err);

        assert_eq!(err.message, ValidationError::INVALID_PAYLOAD);
        assert_eq!(
            err.issues,
            vec![ValidationIssue::new("content", "must not be empty")]
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::MissingToken.status_code(), 401);
        assert_eq!(AppError::Auth(AuthError::Expired).status_code(), 401);
        assert_eq!(AppError::RoomNotFound.status_code(), 404);
        assert_eq!(AppError::Decryption("x".into()).status_code(), 500);
        assert_eq!(
            AppError::from(PipelineError::Validation(ValidationError::single("content", "empty")))
                .status_code(),
            400
        );
    }
}
