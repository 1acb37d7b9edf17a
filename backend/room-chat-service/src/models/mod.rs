pub mod message;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use message::{MessageKind, NewMessage, NewMessageRow, PlainMessage, StoredMessage};

pub type RoomId = i64;
pub type UserId = i64;

/// A registered account, as resolved from a token subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub topic: Option<String>,
    pub created_at: DateTime<Utc>,
}
