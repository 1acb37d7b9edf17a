use crate::error::{AppError, ValidationError};
use crate::middleware::auth::CurrentUser;
use crate::models::{MessageKind, NewMessage, RoomId};
use crate::state::AppState;
use crate::websocket::message_types::OutboundEvent;
use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file already stored out of band, announced to the room.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttachmentDescriptor {
    #[validate(length(min = 1, max = 255, message = "file_name must be between 1 and 255 characters"))]
    pub file_name: String,
    #[validate(length(min = 1, max = 255, message = "file_url must be between 1 and 255 characters"))]
    pub file_url: String,
    #[validate(length(min = 1, max = 100, message = "mime_type must be between 1 and 100 characters"))]
    pub mime_type: Option<String>,
}

impl AttachmentDescriptor {
    pub fn mime(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_mime(self.mime())
    }

    /// Human-readable body, e.g. `Image: cat.png`.
    pub fn description(&self) -> String {
        let label = match self.kind() {
            MessageKind::Image => "Image",
            MessageKind::Video => "Video",
            _ => "File",
        };
        format!("{label}: {}", self.file_name)
    }
}

/// POST /rooms/{room_id}/attachments
///
/// Persists a message for the attachment and broadcasts it to everyone in the room.
#[post("/rooms/{room_id}/attachments")]
pub async fn announce_attachment(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<RoomId>,
    body: web::Json<AttachmentDescriptor>,
) -> Result<HttpResponse, AppError> {
    let room_id = path.into_inner();
    let descriptor = body.into_inner();
    descriptor.validate().map_err(ValidationError::from)?;

    state
        .rooms
        .resolve_room(room_id)
        .await?
        .ok_or(AppError::RoomNotFound)?;

    let content = descriptor.description();
    let input = NewMessage {
        room_id,
        author: user.0,
        content: Some(content.clone()),
        kind: descriptor.kind(),
        file_ref: Some(descriptor.file_url.clone()),
        mime_type: Some(descriptor.mime().to_string()),
    };
    let stored = state.pipeline.create(input).await?;
    let message = stored.into_plain(Some(content));

    let event = OutboundEvent::Message(message.clone());
    match state.dispatcher.broadcast(room_id, &event, None).await {
        Ok(report) => tracing::info!(
            room_id,
            message_id = message.id,
            delivered = report.delivered,
            "attachment announced"
        ),
        Err(e) => tracing::error!(room_id, message_id = message.id, error = %e, "attachment broadcast failed"),
    }

    Ok(HttpResponse::Created().json(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(mime: Option<&str>) -> AttachmentDescriptor {
        AttachmentDescriptor {
            file_name: "cat.png".into(),
            file_url: "/uploads/cat.png".into(),
            mime_type: mime.map(str::to_string),
        }
    }

    #[test]
    fn kind_and_description_follow_mime() {
        assert_eq!(descriptor(Some("image/png")).kind(), MessageKind::Image);
        assert_eq!(descriptor(Some("image/png")).description(), "Image: cat.png");
        assert_eq!(descriptor(Some("video/mp4")).description(), "Video: cat.png");
        assert_eq!(descriptor(Some("application/pdf")).description(), "File: cat.png");
    }

    #[test]
    fn missing_mime_defaults_to_octet_stream() {
        let d = descriptor(None);
        assert_eq!(d.mime(), "application/octet-stream");
        assert_eq!(d.kind(), MessageKind::File);
    }

    #[test]
    fn empty_file_name_is_invalid() {
        let mut d = descriptor(None);
        d.file_name.clear();
        let err = ValidationError::from(d.validate().unwrap_err());
        assert_eq!(err.issues[0].field, "file_name");
    }
}
