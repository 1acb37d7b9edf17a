use crate::models::{MessageKind, NewMessageRow, Room, RoomId, StoredMessage, User};
use crate::services::store::{MessageStore, RoomDirectory, StoreError, UserDirectory};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

/// PostgreSQL-backed store for messages, rooms and users.
#[derive(Clone)]
pub struct PgStore {
    db: Pool<Postgres>,
}

impl PgStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }

    fn message_from_row(row: &PgRow) -> Result<StoredMessage, StoreError> {
        let kind: String = row.try_get("message_type")?;
        let message_type = kind.parse::<MessageKind>().map_err(StoreError::CorruptRow)?;

        Ok(StoredMessage {
            id: row.try_get("id")?,
            room_id: row.try_get("room_id")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            content_encrypted: row.try_get("content_encrypted")?,
            message_type,
            file_path: row.try_get("file_path")?,
            mime_type: row.try_get("mime_type")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert(&self, row: NewMessageRow) -> Result<StoredMessage, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (room_id, user_id, content_encrypted, message_type, file_path, mime_type, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(row.room_id)
        .bind(row.author.id)
        .bind(row.content_encrypted.as_deref())
        .bind(row.message_type.as_str())
        .bind(row.file_path.as_deref())
        .bind(row.mime_type.as_deref())
        .bind(row.created_at)
        .fetch_one(&self.db)
        .await?;

        Ok(StoredMessage::from_row(id, row))
    }

    async fn recent(&self, room_id: RoomId, limit: i64, skip: i64) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT m.id, m.room_id, m.user_id, u.username, m.content_encrypted, m.message_type, \
                    m.file_path, m.mime_type, m.created_at \
             FROM messages m \
             JOIN users u ON u.id = m.user_id \
             WHERE m.room_id = $1 \
             ORDER BY m.created_at DESC, m.id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(room_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::message_from_row).collect()
    }
}

#[async_trait]
impl RoomDirectory for PgStore {
    async fn resolve_room(&self, room_id: RoomId) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query("SELECT id, name, topic, created_at FROM chat_rooms WHERE id = $1")
            .bind(room_id)
            .fetch_optional(&self.db)
            .await?;

        row.map(|r| -> Result<_, StoreError> {
            Ok(Room {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                topic: r.try_get("topic")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, username FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        row.map(|r| -> Result<_, StoreError> {
            Ok(User {
                id: r.try_get("id")?,
                username: r.try_get("username")?,
            })
        })
        .transpose()
    }
}
