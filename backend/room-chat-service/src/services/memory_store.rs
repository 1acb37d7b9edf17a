use crate::models::{NewMessageRow, Room, RoomId, StoredMessage, User};
use crate::services::store::{MessageStore, RoomDirectory, StoreError, UserDirectory};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    rooms: Vec<Room>,
    messages: Vec<StoredMessage>,
}

/// In-process store for local runs and tests.
///
/// Writes can be forced to fail with [`MemoryStore::fail_writes`] to exercise
/// the persistence error path.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, username: &str) -> User {
        let mut tables = self.tables.write().await;
        let user = User {
            id: tables.users.len() as i64 + 1,
            username: username.to_string(),
        };
        tables.users.push(user.clone());
        user
    }

    pub async fn add_room(&self, name: &str, topic: Option<&str>) -> Room {
        let mut tables = self.tables.write().await;
        let room = Room {
            id: tables.rooms.len() as i64 + 1,
            name: name.to_string(),
            topic: topic.map(str::to_string),
            created_at: Utc::now(),
        };
        tables.rooms.push(room.clone());
        room
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn message_count(&self, room_id: RoomId) -> usize {
        self.tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .count()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, row: NewMessageRow) -> Result<StoredMessage, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        let mut tables = self.tables.write().await;
        let message = StoredMessage::from_row(tables.messages.len() as i64 + 1, row);
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn recent(&self, room_id: RoomId, limit: i64, skip: i64) -> Result<Vec<StoredMessage>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<StoredMessage> = tables
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(rows
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl RoomDirectory for MemoryStore {
    async fn resolve_room(&self, room_id: RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }
}
