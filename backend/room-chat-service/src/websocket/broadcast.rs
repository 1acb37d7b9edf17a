use super::message_types::OutboundEvent;
use super::{ConnectionHandle, ConnectionId, ConnectionRegistry, DeliveryError};
use crate::models::RoomId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub skipped: usize,
    pub pruned: Vec<ConnectionId>,
}

/// Fans events out to every connection of a room.
///
/// The room is snapshotted under the registry lock and sends happen outside
/// it. Only transport failures prune a connection, and pruning runs after the
/// pass so the walked set is never mutated.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: ConnectionRegistry,
}

impl BroadcastDispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub async fn broadcast(
        &self,
        room_id: RoomId,
        event: &OutboundEvent,
        exclude: Option<ConnectionId>,
    ) -> Result<BroadcastReport, BroadcastError> {
        let frame = event.to_frame()?;
        Ok(self.broadcast_frame(room_id, frame, exclude).await)
    }

    /// Fan out an already encoded frame.
    pub async fn broadcast_frame(
        &self,
        room_id: RoomId,
        frame: String,
        exclude: Option<ConnectionId>,
    ) -> BroadcastReport {
        let connections = self.registry.snapshot(room_id).await;
        let mut report = BroadcastReport::default();

        for connection in &connections {
            if Some(connection.id()) == exclude {
                report.skipped += 1;
                continue;
            }
            match connection.send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::ConnectionClosed) => report.pruned.push(connection.id()),
            }
        }

        for connection_id in &report.pruned {
            self.registry.remove(room_id, *connection_id).await;
        }

        if !report.pruned.is_empty() {
            tracing::debug!(
                room_id,
                delivered = report.delivered,
                pruned = report.pruned.len(),
                "pruned dead connections after broadcast"
            );
        }
        report
    }

    /// Best-effort delivery to one connection.
    pub fn send_to(&self, connection: &ConnectionHandle, event: &OutboundEvent) {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode direct event");
                return;
            }
        };
        if let Err(e) = connection.send(frame) {
            tracing::debug!(connection_id = %connection.id(), error = %e, "direct send dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn join(registry: &ConnectionRegistry, room_id: RoomId, name: &str) -> (ConnectionHandle, UnboundedReceiver<String>) {
        let user = User {
            id: 1,
            username: name.into(),
        };
        let (handle, rx) = ConnectionHandle::open(ConnectionId::new(), &user);
        registry.add(room_id, handle.clone()).await;
        (handle, rx)
    }

    #[tokio::test]
    async fn delivers_to_all_but_excluded() {
        let registry = ConnectionRegistry::new();
        let dispatcher = BroadcastDispatcher::new(registry.clone());
        let (a, mut ra) = join(&registry, 1, "alice").await;
        let (_b, mut rb) = join(&registry, 1, "bob").await;

        let report = dispatcher
            .broadcast(1, &OutboundEvent::joined(1, "alice"), Some(a.id()))
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
        assert!(rb.try_recv().unwrap().contains("alice joined the room"));
        assert!(ra.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_connection_is_pruned_and_others_unaffected() {
        let registry = ConnectionRegistry::new();
        let dispatcher = BroadcastDispatcher::new(registry.clone());
        let (_a, mut ra) = join(&registry, 1, "alice").await;
        let (x, rx) = join(&registry, 1, "xavier").await;
        drop(rx);

        let report = dispatcher
            .broadcast(1, &OutboundEvent::error("first"), None)
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, vec![x.id()]);
        assert_eq!(registry.connection_count(1).await, 1);

        let report = dispatcher
            .broadcast(1, &OutboundEvent::error("second"), None)
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert!(report.pruned.is_empty());
        assert!(ra.try_recv().unwrap().contains("first"));
        assert!(ra.try_recv().unwrap().contains("second"));
    }

    #[tokio::test]
    async fn other_rooms_receive_nothing() {
        let registry = ConnectionRegistry::new();
        let dispatcher = BroadcastDispatcher::new(registry.clone());
        let (_a, mut ra) = join(&registry, 1, "alice").await;
        let (_c, mut rc) = join(&registry, 2, "carol").await;

        dispatcher
            .broadcast(2, &OutboundEvent::error("room two only"), None)
            .await
            .unwrap();

        assert!(ra.try_recv().is_err());
        assert!(rc.try_recv().is_ok());
    }

    #[tokio::test]
    async fn empty_room_is_a_noop() {
        let dispatcher = BroadcastDispatcher::new(ConnectionRegistry::new());
        let report = dispatcher
            .broadcast(42, &OutboundEvent::error("nobody"), None)
            .await
            .unwrap();
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn send_to_swallows_closed_connection() {
        let registry = ConnectionRegistry::new();
        let dispatcher = BroadcastDispatcher::new(registry.clone());
        let (a, ra) = join(&registry, 1, "alice").await;
        drop(ra);

        dispatcher.send_to(&a, &OutboundEvent::error("ignored"));
        assert_eq!(registry.connection_count(1).await, 1);
    }
}
