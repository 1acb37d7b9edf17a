//! Persistence collaborators consumed by the chat core.
//!
//! Users and rooms belong to the CRUD layer; the core only resolves them.
//! Messages are insert-only.

use crate::models::{NewMessageRow, Room, RoomId, StoredMessage, User};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert one row and return it with its assigned id.
    async fn insert(&self, row: NewMessageRow) -> Result<StoredMessage, StoreError>;

    /// Newest-first page of a room's messages.
    async fn recent(&self, room_id: RoomId, limit: i64, skip: i64) -> Result<Vec<StoredMessage>, StoreError>;
}

#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn resolve_room(&self, room_id: RoomId) -> Result<Option<Room>, StoreError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}
