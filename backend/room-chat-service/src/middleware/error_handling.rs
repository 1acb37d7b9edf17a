use crate::error::AppError;
use crate::websocket::session::HandshakeRejection;
use actix_web::{http::StatusCode, HttpResponse};
use crypto_core::jwt::AuthError;
use error_types::{error_codes, error_types as kinds, ErrorResponse};

/// Map a service error to its HTTP status and JSON body.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (error_type, code) = match err {
        AppError::BadRequest(_) | AppError::Validation(_) => {
            (kinds::VALIDATION_ERROR, error_codes::VALIDATION_ERROR)
        }
        AppError::MissingToken => (kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_MISSING),
        AppError::Auth(AuthError::Expired) => {
            (kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_EXPIRED)
        }
        AppError::Auth(_) => (kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_INVALID),
        AppError::UnknownUser => (kinds::AUTHENTICATION_ERROR, error_codes::USER_NOT_FOUND),
        AppError::RoomNotFound => (kinds::NOT_FOUND_ERROR, error_codes::ROOM_NOT_FOUND),
        AppError::Database(_) => (kinds::SERVER_ERROR, error_codes::DATABASE_ERROR),
        AppError::Encryption(_) => (kinds::SERVER_ERROR, error_codes::ENCRYPTION_ERROR),
        AppError::Decryption(_) => (kinds::SERVER_ERROR, error_codes::DECRYPTION_ERROR),
        AppError::Config(_) => (kinds::SERVER_ERROR, error_codes::CONFIG_ERROR),
        AppError::StartServer(_) | AppError::Internal => {
            (kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR)
        }
    };

    // Storage and crypto internals stay in the logs.
    let message = match err {
        AppError::Database(_) => "Message store is unavailable".to_string(),
        AppError::Encryption(_) | AppError::Decryption(_) => {
            "Stored message content could not be processed".to_string()
        }
        other => other.to_string(),
    };

    let mut response = ErrorResponse::new(
        status.canonical_reason().unwrap_or("Error"),
        &message,
        status.as_u16(),
        error_type,
        code,
    );
    if let AppError::Validation(validation) = err {
        if let Ok(details) = serde_json::to_value(&validation.issues) {
            response = response.with_details(details);
        }
    }

    (status, response)
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, response) = map_error(err);
    if status.is_server_error() {
        tracing::error!(error = %err, code = %response.code, "request failed");
    } else {
        tracing::debug!(error = %err, code = %response.code, "request rejected");
    }
    HttpResponse::build(status).json(response)
}

/// Refusal of a WebSocket handshake, answered before the upgrade.
///
/// Policy violations are 403; a failed directory lookup is 503.
pub fn map_rejection(rejection: &HandshakeRejection) -> (StatusCode, ErrorResponse) {
    let (status, error_type, code) = match rejection {
        HandshakeRejection::MissingToken => (
            StatusCode::FORBIDDEN,
            kinds::AUTHORIZATION_ERROR,
            error_codes::TOKEN_MISSING,
        ),
        HandshakeRejection::InvalidToken(AuthError::Expired) => (
            StatusCode::FORBIDDEN,
            kinds::AUTHORIZATION_ERROR,
            error_codes::TOKEN_EXPIRED,
        ),
        HandshakeRejection::InvalidToken(_) => (
            StatusCode::FORBIDDEN,
            kinds::AUTHORIZATION_ERROR,
            error_codes::TOKEN_INVALID,
        ),
        HandshakeRejection::UnknownUser => (
            StatusCode::FORBIDDEN,
            kinds::AUTHORIZATION_ERROR,
            error_codes::USER_NOT_FOUND,
        ),
        HandshakeRejection::UnknownRoom => (
            StatusCode::FORBIDDEN,
            kinds::AUTHORIZATION_ERROR,
            error_codes::ROOM_NOT_FOUND,
        ),
        HandshakeRejection::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            kinds::SERVICE_UNAVAILABLE_ERROR,
            error_codes::SERVICE_UNAVAILABLE,
        ),
    };
    let response = ErrorResponse::new(
        status.canonical_reason().unwrap_or("Error"),
        &rejection.to_string(),
        status.as_u16(),
        error_type,
        code,
    );
    (status, response)
}

pub fn rejection_response(rejection: &HandshakeRejection) -> HttpResponse {
    let (status, response) = map_rejection(rejection);
    HttpResponse::build(status).json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn expired_token_maps_to_token_expired() {
        let (status, body) = map_error(&AppError::Auth(AuthError::Expired));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, error_codes::TOKEN_EXPIRED);
        assert_eq!(body.error, "Unauthorized");
    }

    #[test]
    fn validation_carries_details() {
        let err = AppError::Validation(ValidationError::single("file_name", "must not be empty"));
        let (status, body) = map_error(&err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error_type, kinds::VALIDATION_ERROR);
        let details = body.details.unwrap();
        assert_eq!(details[0]["field"], "file_name");
    }

    #[test]
    fn decryption_hides_internals() {
        let (status, body) = map_error(&AppError::Decryption("tag mismatch".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, error_codes::DECRYPTION_ERROR);
        assert!(!body.message.contains("tag mismatch"));
    }

    #[test]
    fn handshake_rejections() {
        let (status, body) = map_rejection(&HandshakeRejection::InvalidToken(AuthError::Expired));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.code, error_codes::TOKEN_EXPIRED);

        let (status, body) = map_rejection(&HandshakeRejection::UnknownRoom);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.code, error_codes::ROOM_NOT_FOUND);

        let (status, _) = map_rejection(&HandshakeRejection::Unavailable);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
