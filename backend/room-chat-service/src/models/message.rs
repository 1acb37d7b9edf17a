use super::{RoomId, User, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    File,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::File => "file",
            MessageKind::System => "system",
        }
    }

    /// Textual kinds must carry a body.
    pub fn is_textual(&self) -> bool {
        matches!(self, MessageKind::Text | MessageKind::System)
    }

    /// Attachment kind for a MIME type: `image/*`, `video/*`, anything else is a file.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MessageKind::Image
        } else if mime.starts_with("video/") {
            MessageKind::Video
        } else {
            MessageKind::File
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "video" => Ok(MessageKind::Video),
            "file" => Ok(MessageKind::File),
            "system" => Ok(MessageKind::System),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

/// Input to `MessagePipeline::create`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub author: User,
    pub content: Option<String>,
    pub kind: MessageKind,
    pub file_ref: Option<String>,
    pub mime_type: Option<String>,
}

impl NewMessage {
    pub fn text(room_id: RoomId, author: User, content: impl Into<String>) -> Self {
        Self {
            room_id,
            author,
            content: Some(content.into()),
            kind: MessageKind::Text,
            file_ref: None,
            mime_type: None,
        }
    }
}

/// Row handed to the store: content is already encrypted.
#[derive(Debug, Clone)]
pub struct NewMessageRow {
    pub room_id: RoomId,
    pub author: User,
    pub content_encrypted: Option<Vec<u8>>,
    pub message_type: MessageKind,
    pub file_path: Option<String>,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A persisted message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub content_encrypted: Option<Vec<u8>>,
    pub message_type: MessageKind,
    pub file_path: Option<String>,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn from_row(id: i64, row: NewMessageRow) -> Self {
        Self {
            id,
            room_id: row.room_id,
            user_id: row.author.id,
            username: row.author.username,
            content_encrypted: row.content_encrypted,
            message_type: row.message_type,
            file_path: row.file_path,
            mime_type: row.mime_type,
            created_at: row.created_at,
        }
    }

    /// Presentation form with already known plaintext.
    pub fn into_plain(self, content: Option<String>) -> PlainMessage {
        PlainMessage {
            id: self.id,
            room_id: self.room_id,
            user_id: self.user_id,
            username: self.username,
            content,
            message_type: self.message_type,
            file_url: self.file_path,
            mime_type: self.mime_type,
            created_at: self.created_at,
        }
    }
}

/// Decrypted message as delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainMessage {
    pub id: i64,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub content: Option<String>,
    pub message_type: MessageKind,
    pub file_url: Option<String>,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
}
