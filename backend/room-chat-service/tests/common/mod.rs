#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Duration;
use room_chat_service::config::Config;
use room_chat_service::models::{Room, RoomId, User};
use room_chat_service::services::memory_store::MemoryStore;
use room_chat_service::state::AppState;
use room_chat_service::websocket::session::{
    ChatSession, CloseReason, InboundFrame, SessionError, SessionTransport,
};
use room_chat_service::websocket::{ConnectionId, DeliveryError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const WAIT: std::time::Duration = std::time::Duration::from_secs(2);
pub const QUIET: std::time::Duration = std::time::Duration::from_millis(150);

pub struct Fixture {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub alice: User,
    pub bob: User,
    pub carol: User,
    pub lobby: Room,
    pub annex: Room,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(Config::test_defaults()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let carol = store.add_user("carol").await;
        let lobby = store.add_room("lobby", Some("general chat")).await;
        let annex = store.add_room("annex", None).await;
        let state = AppState::new(Arc::new(config), store.clone()).expect("app state");

        Self {
            state,
            store,
            alice,
            bob,
            carol,
            lobby,
            annex,
        }
    }

    pub fn token(&self, username: &str) -> String {
        self.state
            .authenticator
            .keys()
            .issue(username, Duration::minutes(10))
            .expect("issue token")
    }

    pub fn expired_token(&self, username: &str) -> String {
        self.state
            .authenticator
            .keys()
            .issue(username, Duration::seconds(-30))
            .expect("issue token")
    }

    /// Handshake, then run the session on its own task until it is registered.
    pub async fn connect(&self, room_id: RoomId, username: &str) -> Result<Client, SessionError> {
        let token = self.token(username);
        connect_with_token(&self.state, room_id, Some(&token)).await
    }
}

pub async fn connect_with_token(
    state: &AppState,
    room_id: RoomId,
    token: Option<&str>,
) -> Result<Client, SessionError> {
    let mut session = ChatSession::new(state.clone(), room_id);
    session.handshake(token).await?;
    let connection_id = session.connection_id();

    let (transport, outbound, wire) = mock_pair();
    let task = actix_rt::spawn(session.drive(transport));

    timeout(WAIT, async {
        while state.registry.get(room_id, connection_id).await.is_none() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("session was never admitted");

    Ok(Client {
        room_id,
        connection_id,
        task,
        outbound: Some(outbound),
        wire,
    })
}

/// What the session wrote to its socket.
#[derive(Debug)]
pub enum Wire {
    Frame(String),
    Closed(CloseReason),
}

/// In-memory socket: the session reads `InboundFrame`s and writes `Wire` items.
pub struct MockTransport {
    inbound: UnboundedReceiver<InboundFrame>,
    wire: UnboundedSender<Wire>,
}

#[async_trait(?Send)]
impl SessionTransport for MockTransport {
    async fn next_frame(&mut self) -> Option<InboundFrame> {
        self.inbound.recv().await
    }

    async fn send_text(&mut self, frame: String) -> Result<(), DeliveryError> {
        self.wire
            .send(Wire::Frame(frame))
            .map_err(|_| DeliveryError::ConnectionClosed)
    }

    async fn close(&mut self, reason: &CloseReason) {
        let _ = self.wire.send(Wire::Closed(reason.clone()));
    }
}

/// Client end of a [`MockTransport`].
pub struct Client {
    pub room_id: RoomId,
    pub connection_id: ConnectionId,
    pub task: JoinHandle<CloseReason>,
    outbound: Option<UnboundedSender<InboundFrame>>,
    wire: UnboundedReceiver<Wire>,
}

pub fn mock_pair() -> (MockTransport, UnboundedSender<InboundFrame>, UnboundedReceiver<Wire>) {
    let (inbound_tx, inbound_rx) = unbounded_channel();
    let (wire_tx, wire_rx) = unbounded_channel();
    let transport = MockTransport {
        inbound: inbound_rx,
        wire: wire_tx,
    };
    (transport, inbound_tx, wire_rx)
}

impl Client {
    pub fn send_text(&self, text: impl Into<String>) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(InboundFrame::Text(text.into()));
        }
    }

    pub fn send_json(&self, value: Value) {
        self.send_text(value.to_string());
    }

    pub fn send_binary(&self) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(InboundFrame::Binary);
        }
    }

    pub fn close(&self) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(InboundFrame::Close);
        }
    }

    /// Drop the inbound side, as if the network went away.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }

    /// Stop reading the socket while keeping it open, so server writes fail.
    pub fn stop_reading(&mut self) {
        let (_, closed) = unbounded_channel();
        self.wire = closed;
    }

    /// Next event frame. Panics on timeout or close.
    pub async fn next_event(&mut self) -> Value {
        match timeout(WAIT, self.wire.recv()).await {
            Ok(Some(Wire::Frame(frame))) => serde_json::from_str(&frame).expect("json frame"),
            Ok(Some(Wire::Closed(reason))) => panic!("socket closed: {reason:?}"),
            Ok(None) => panic!("transport dropped"),
            Err(_) => panic!("no event within {WAIT:?}"),
        }
    }

    /// Asserts nothing arrives for a short while.
    pub async fn expect_silence(&mut self) {
        if let Ok(Some(wire)) = timeout(QUIET, self.wire.recv()).await {
            panic!("unexpected wire item: {wire:?}");
        }
    }

    /// Skip frames until the close frame arrives.
    pub async fn closed(&mut self) -> CloseReason {
        loop {
            match timeout(WAIT, self.wire.recv()).await {
                Ok(Some(Wire::Closed(reason))) => return reason,
                Ok(Some(Wire::Frame(_))) => continue,
                Ok(None) => panic!("transport dropped without close"),
                Err(_) => panic!("no close within {WAIT:?}"),
            }
        }
    }

    pub async fn finished(self) -> CloseReason {
        timeout(WAIT, self.task)
            .await
            .expect("session did not finish")
            .expect("session task panicked")
    }
}
