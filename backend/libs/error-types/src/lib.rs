use serde::{Deserialize, Serialize};

/// Uniform JSON error body returned by every HTTP endpoint of the chat services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Short reason phrase, e.g. "Not Found"
    pub error: String,

    /// Human readable explanation
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Error class used by clients for routing (see [`error_types`])
    pub error_type: String,

    /// Stable machine readable code (see [`error_codes`])
    pub code: String,

    /// Structured detail, e.g. field-level validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Stable error codes.
pub mod error_codes {
    // Authentication
    pub const TOKEN_MISSING: &str = "TOKEN_MISSING";
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

    // Rooms and messages
    pub const ROOM_NOT_FOUND: &str = "ROOM_NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const ENCRYPTION_ERROR: &str = "ENCRYPTION_ERROR";
    pub const DECRYPTION_ERROR: &str = "DECRYPTION_ERROR";

    // Database/System
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
}

/// Error classes.
pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "service_unavailable_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new(
            "Not Found",
            "Room not found",
            404,
            error_types::NOT_FOUND_ERROR,
            error_codes::ROOM_NOT_FOUND,
        );

        assert_eq!(error.status, 404);
        assert_eq!(error.error_type, error_types::NOT_FOUND_ERROR);
        assert_eq!(error.code, error_codes::ROOM_NOT_FOUND);
        assert!(error.details.is_none());
    }

    #[test]
    fn test_error_response_with_details() {
        let error = ErrorResponse::new(
            "Bad Request",
            "Invalid message payload",
            400,
            error_types::VALIDATION_ERROR,
            error_codes::VALIDATION_ERROR,
        )
        .with_details(serde_json::json!([{ "field": "content", "message": "too short" }]));

        let body = serde_json::to_value(&error).unwrap();
        assert_eq!(body["details"][0]["field"], "content");
        assert!(body.get("timestamp").is_some());
    }
}
