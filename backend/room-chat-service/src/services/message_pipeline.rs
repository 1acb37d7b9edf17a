use crate::error::{PipelineError, ValidationError, ValidationIssue};
use crate::models::{NewMessage, NewMessageRow, PlainMessage, RoomId, StoredMessage};
use crate::services::encryption::MessageCipher;
use crate::services::store::MessageStore;
use chrono::Utc;
use std::sync::Arc;

pub const MAX_CONTENT_CHARS: usize = 4000;
pub const MAX_FILE_REF_CHARS: usize = 255;
pub const MAX_MIME_CHARS: usize = 100;

/// Validate → encrypt → persist on write, decrypt on read.
///
/// A message returned by [`MessagePipeline::create`] is already durable; that
/// return value is the only thing callers may broadcast.
pub struct MessagePipeline {
    store: Arc<dyn MessageStore>,
    cipher: MessageCipher,
}

impl MessagePipeline {
    pub fn new(store: Arc<dyn MessageStore>, cipher: MessageCipher) -> Self {
        Self { store, cipher }
    }

    pub fn validate(input: &NewMessage) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        match input.content.as_deref() {
            None if input.kind.is_textual() => {
                issues.push(ValidationIssue::new(
                    "content",
                    format!("content is required for {} messages", input.kind),
                ));
            }
            None => {}
            Some(text) => {
                let chars = text.chars().count();
                if chars == 0 || chars > MAX_CONTENT_CHARS {
                    issues.push(ValidationIssue::new(
                        "content",
                        format!("content must be between 1 and {MAX_CONTENT_CHARS} characters"),
                    ));
                }
            }
        }

        if let Some(file_ref) = input.file_ref.as_deref() {
            if file_ref.trim().is_empty() || file_ref.chars().count() > MAX_FILE_REF_CHARS {
                issues.push(ValidationIssue::new(
                    "file_url",
                    format!("file reference must be between 1 and {MAX_FILE_REF_CHARS} characters"),
                ));
            }
        }
        if let Some(mime) = input.mime_type.as_deref() {
            if mime.trim().is_empty() || mime.chars().count() > MAX_MIME_CHARS {
                issues.push(ValidationIssue::new(
                    "mime_type",
                    format!("mime type must be between 1 and {MAX_MIME_CHARS} characters"),
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::invalid_payload(issues))
        }
    }

    pub async fn create(&self, input: NewMessage) -> Result<StoredMessage, PipelineError> {
        Self::validate(&input)?;
        let room_id = input.room_id;

        let content_encrypted = self
            .cipher
            .encrypt_optional(input.content.as_deref())
            .map_err(|e| PipelineError::Encryption(e.to_string()))?;

        let row = NewMessageRow {
            room_id,
            author: input.author,
            content_encrypted,
            message_type: input.kind,
            file_path: input.file_ref,
            mime_type: input.mime_type,
            created_at: Utc::now(),
        };

        let stored = self.store.insert(row).await.map_err(|e| {
            tracing::warn!(room_id, error = %e, "message insert failed");
            PipelineError::Persistence(e)
        })?;

        tracing::debug!(
            room_id = stored.room_id,
            message_id = stored.id,
            kind = %stored.message_type,
            "message persisted"
        );
        Ok(stored)
    }

    pub fn read(&self, message: &StoredMessage) -> Result<PlainMessage, PipelineError> {
        let content = self
            .cipher
            .decrypt_optional(message.content_encrypted.as_deref())
            .map_err(|e| PipelineError::Decryption {
                message_id: message.id,
                reason: e.to_string(),
            })?;
        Ok(message.clone().into_plain(content))
    }

    /// The newest `limit` messages after skipping `skip`, oldest first.
    pub async fn history(&self, room_id: RoomId, limit: i64, skip: i64) -> Result<Vec<PlainMessage>, PipelineError> {
        let mut rows = self.store.recent(room_id, limit, skip).await?;
        rows.reverse();

        rows.iter()
            .map(|row| {
                self.read(row).map_err(|e| {
                    tracing::error!(room_id, message_id = row.id, error = %e, "history decryption failed");
                    e
                })
            })
            .collect()
    }
}
