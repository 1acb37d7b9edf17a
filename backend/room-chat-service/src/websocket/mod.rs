use crate::models::{RoomId, User};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod broadcast;
pub mod message_types;
pub mod session;

/// Unique identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A frame could not be handed to a connection because its transport is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection is closed")]
    ConnectionClosed,
}

/// Registry entry for one admitted connection.
///
/// Sending pushes onto the connection's outbound queue; the owning session
/// task writes queued frames to the socket in order.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    username: Arc<str>,
    sender: UnboundedSender<String>,
}

impl ConnectionHandle {
    /// Create a handle for `user` and the receiving end of its outbound queue.
    pub fn open(id: ConnectionId, user: &User) -> (Self, UnboundedReceiver<String>) {
        let (sender, receiver) = unbounded_channel();
        let handle = Self {
            id,
            username: Arc::from(user.username.as_str()),
            sender,
        };
        (handle, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn send(&self, frame: String) -> Result<(), DeliveryError> {
        self.sender
            .send(frame)
            .map_err(|_| DeliveryError::ConnectionClosed)
    }
}

/// Live connections grouped by room.
///
/// One lock guards the whole map so `add`, `remove` and `snapshot` are atomic
/// with respect to each other. Rooms exist only while they have connections.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    // room_id -> connection_id -> handle
    inner: Arc<RwLock<HashMap<RoomId, HashMap<ConnectionId, ConnectionHandle>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `room_id`. Returns `false` if it was already present.
    pub async fn add(&self, room_id: RoomId, handle: ConnectionHandle) -> bool {
        let mut guard = self.inner.write().await;
        let connections = guard.entry(room_id).or_default();
        if connections.contains_key(&handle.id) {
            return false;
        }
        let connection_id = handle.id;
        connections.insert(connection_id, handle);

        tracing::debug!(
            room_id,
            %connection_id,
            total = connections.len(),
            "connection added to room"
        );
        true
    }

    /// Deregister a connection. Returns `false` if it was not present.
    pub async fn remove(&self, room_id: RoomId, connection_id: ConnectionId) -> bool {
        let mut guard = self.inner.write().await;
        let Some(connections) = guard.get_mut(&room_id) else {
            return false;
        };

        let removed = connections.remove(&connection_id).is_some();
        let remaining = connections.len();
        if remaining == 0 {
            guard.remove(&room_id);
            tracing::debug!(room_id, "removed empty room from registry");
        }
        if removed {
            tracing::debug!(room_id, %connection_id, remaining, "connection removed from room");
        }
        removed
    }

    /// Point-in-time copy of a room's connections.
    pub async fn snapshot(&self, room_id: RoomId) -> Vec<ConnectionHandle> {
        let guard = self.inner.read().await;
        guard
            .get(&room_id)
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get(&self, room_id: RoomId, connection_id: ConnectionId) -> Option<ConnectionHandle> {
        let guard = self.inner.read().await;
        guard.get(&room_id)?.get(&connection_id).cloned()
    }

    pub async fn connection_count(&self, room_id: RoomId) -> usize {
        let guard = self.inner.read().await;
        guard.get(&room_id).map(|c| c.len()).unwrap_or(0)
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drop every registered connection. Returns how many were dropped.
    ///
    /// Dropping a handle closes its outbound queue, which ends the owning
    /// session with `GoingAway`.
    pub async fn shutdown(&self) -> usize {
        let drained = std::mem::take(&mut *self.inner.write().await);
        let count = drained.values().map(|c| c.len()).sum();
        tracing::info!(rooms = drained.len(), connections = count, "connection registry shut down");
        count
    }
}
