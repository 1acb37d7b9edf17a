use crate::error::{PipelineError, ValidationError, ValidationIssue};
use crate::models::{MessageKind, PlainMessage, RoomId};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Inbound frame from client to server.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClientFrame {
    #[validate(length(min = 1, max = 4000, message = "content must be between 1 and 4000 characters"))]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageKind,
}

impl ClientFrame {
    /// Parse and range-check a text frame.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let frame: ClientFrame = serde_json::from_str(text)
            .map_err(|e| ValidationError::single("body", e.to_string()))?;
        frame.validate()?;
        Ok(frame)
    }
}

/// Outbound envelope: `{"event": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "lowercase")]
pub enum OutboundEvent {
    Message(PlainMessage),
    System(SystemNotice),
    Error(ErrorNotice),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNotice {
    pub message: String,
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Vec<ValidationIssue>>,
}

impl OutboundEvent {
    pub fn joined(room_id: RoomId, username: &str) -> Self {
        OutboundEvent::System(SystemNotice {
            message: format!("{username} joined the room"),
            room_id,
        })
    }

    pub fn left(room_id: RoomId, username: &str) -> Self {
        OutboundEvent::System(SystemNotice {
            message: format!("{username} left the room"),
            room_id,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutboundEvent::Error(ErrorNotice {
            message: message.into(),
            detail: None,
        })
    }

    pub fn invalid(err: &ValidationError) -> Self {
        OutboundEvent::Error(ErrorNotice {
            message: err.message.clone(),
            detail: Some(err.issues.clone()),
        })
    }

    /// Error frame for a failed pipeline call. Internals are not echoed.
    pub fn from_pipeline_error(err: &PipelineError) -> Self {
        match err {
            PipelineError::Validation(v) => Self::invalid(v),
            PipelineError::Encryption(_) | PipelineError::Persistence(_) => {
                Self::error("Message could not be saved")
            }
            PipelineError::Decryption { .. } => Self::error("Message could not be read"),
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
