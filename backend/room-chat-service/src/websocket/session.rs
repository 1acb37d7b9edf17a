use super::message_types::{ClientFrame, OutboundEvent};
use super::{ConnectionHandle, ConnectionId, DeliveryError};
use crate::models::{NewMessage, RoomId, User};
use crate::state::AppState;
use async_trait::async_trait;
use crypto_core::jwt::AuthError;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Authenticated,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Handshaking, Authenticated)
                | (Handshaking, Closed)
                | (Authenticated, Active)
                | (Authenticated, Closed)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Handshaking => "handshaking",
            SessionState::Authenticated => "authenticated",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a session ended, carried on the close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    PolicyViolation(String),
    ClientRequested,
    Disconnected,
    GoingAway,
    InternalError(String),
}

impl CloseReason {
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::PolicyViolation(_) => CLOSE_POLICY_VIOLATION,
            CloseReason::ClientRequested | CloseReason::Disconnected => CLOSE_NORMAL,
            CloseReason::GoingAway => CLOSE_GOING_AWAY,
            CloseReason::InternalError(_) => CLOSE_INTERNAL_ERROR,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            CloseReason::PolicyViolation(reason) | CloseReason::InternalError(reason) => {
                Some(reason.as_str())
            }
            CloseReason::GoingAway => Some("server shutting down"),
            CloseReason::ClientRequested | CloseReason::Disconnected => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeRejection {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(AuthError),
    #[error("unknown user")]
    UnknownUser,
    #[error("room not found")]
    UnknownRoom,
    #[error("directory lookup failed")]
    Unavailable,
}

impl HandshakeRejection {
    pub fn close_reason(&self) -> CloseReason {
        match self {
            HandshakeRejection::Unavailable => CloseReason::InternalError(self.to_string()),
            _ => CloseReason::PolicyViolation(self.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
    #[error("session is not authenticated")]
    NotAuthenticated,
    #[error("session was not admitted to the room")]
    NotAdmitted,
    #[error("handshake rejected: {0}")]
    Rejected(HandshakeRejection),
}

/// What the transport read from the socket, reduced to what a session cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary,
    Close,
}

/// Socket side of a session. `next_frame` returning `None` means the stream ended.
///
/// Implementations must be cancel safe in `next_frame`; the session polls it
/// alongside its outbound queue.
#[async_trait(?Send)]
pub trait SessionTransport {
    async fn next_frame(&mut self) -> Option<InboundFrame>;
    async fn send_text(&mut self, frame: String) -> Result<(), DeliveryError>;
    async fn close(&mut self, reason: &CloseReason);
}

/// One client connection to one room, from handshake to teardown.
pub struct ChatSession {
    app: AppState,
    room_id: RoomId,
    state: SessionState,
    connection_id: ConnectionId,
    user: Option<User>,
    outbound: Option<UnboundedReceiver<String>>,
}

impl ChatSession {
    pub fn new(app: AppState, room_id: RoomId) -> Self {
        Self {
            app,
            room_id,
            state: SessionState::Handshaking,
            connection_id: ConnectionId::new(),
            user: None,
            outbound: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(connection_id = %self.connection_id, from = %self.state, to = %next, "session transition");
        self.state = next;
        Ok(())
    }

    /// Verify the token and resolve user and room. A rejection closes the session.
    pub async fn handshake(&mut self, token: Option<&str>) -> Result<(), SessionError> {
        if self.state != SessionState::Handshaking {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: SessionState::Authenticated,
            });
        }

        match self.authenticate(token).await {
            Ok(user) => {
                tracing::debug!(
                    room_id = self.room_id,
                    user = %user.username,
                    connection_id = %self.connection_id,
                    "websocket handshake accepted"
                );
                self.user = Some(user);
                self.transition(SessionState::Authenticated)
            }
            Err(rejection) => {
                tracing::warn!(
                    room_id = self.room_id,
                    reason = %rejection,
                    "websocket handshake rejected"
                );
                self.transition(SessionState::Closed)?;
                Err(SessionError::Rejected(rejection))
            }
        }
    }

    async fn authenticate(&self, token: Option<&str>) -> Result<User, HandshakeRejection> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(HandshakeRejection::MissingToken)?;
        let claim = self
            .app
            .authenticator
            .verify(token)
            .map_err(HandshakeRejection::InvalidToken)?;

        let user = self
            .app
            .users
            .find_by_username(&claim.username)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "user lookup failed during handshake");
                HandshakeRejection::Unavailable
            })?
            .ok_or(HandshakeRejection::UnknownUser)?;

        self.app
            .rooms
            .resolve_room(self.room_id)
            .await
            .map_err(|e| {
                tracing::error!(room_id = self.room_id, error = %e, "room lookup failed during handshake");
                HandshakeRejection::Unavailable
            })?
            .ok_or(HandshakeRejection::UnknownRoom)?;

        Ok(user)
    }

    /// Register the connection and announce the join to the rest of the room.
    pub async fn admit(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Authenticated {
            return Err(SessionError::NotAuthenticated);
        }
        let user = self.user.clone().ok_or(SessionError::NotAuthenticated)?;

        let (handle, outbound) = ConnectionHandle::open(self.connection_id, &user);
        if !self.app.registry.add(self.room_id, handle).await {
            self.transition(SessionState::Closed)?;
            return Err(SessionError::NotAdmitted);
        }
        self.outbound = Some(outbound);
        self.transition(SessionState::Active)?;

        tracing::info!(
            room_id = self.room_id,
            user = %user.username,
            connection_id = %self.connection_id,
            "user joined room"
        );
        let joined = OutboundEvent::joined(self.room_id, &user.username);
        if let Err(e) = self
            .app
            .dispatcher
            .broadcast(self.room_id, &joined, Some(self.connection_id))
            .await
        {
            tracing::warn!(room_id = self.room_id, error = %e, "join notice not sent");
        }
        Ok(())
    }

    /// Multiplex inbound frames and the outbound queue until the connection ends.
    pub async fn run<T: SessionTransport>(&mut self, transport: &mut T) -> Result<CloseReason, SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::NotAdmitted);
        }
        let mut outbound = self.outbound.take().ok_or(SessionError::NotAdmitted)?;

        let reason = loop {
            tokio::select! {
                inbound = transport.next_frame() => match inbound {
                    Some(InboundFrame::Text(text)) => self.handle_text(&text).await,
                    Some(InboundFrame::Binary) => {
                        self.reply(&OutboundEvent::error("Binary frames are not supported")).await
                    }
                    Some(InboundFrame::Close) => break CloseReason::ClientRequested,
                    None => break CloseReason::Disconnected,
                },
                queued = outbound.recv() => match queued {
                    Some(frame) => {
                        if transport.send_text(frame).await.is_err() {
                            break CloseReason::Disconnected;
                        }
                    }
                    None => break CloseReason::GoingAway,
                },
            }
        };
        Ok(reason)
    }

    async fn handle_text(&self, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(invalid) => {
                tracing::debug!(connection_id = %self.connection_id, error = %invalid, "invalid client frame");
                self.reply(&OutboundEvent::invalid(&invalid)).await;
                return;
            }
        };
        let Some(author) = self.user.clone() else {
            return;
        };

        let content = frame.content.clone();
        let input = NewMessage {
            room_id: self.room_id,
            author,
            content: Some(frame.content),
            kind: frame.message_type,
            file_ref: None,
            mime_type: None,
        };
        match self.app.pipeline.create(input).await {
            Ok(stored) => {
                let event = OutboundEvent::Message(stored.into_plain(Some(content)));
                if let Err(e) = self.app.dispatcher.broadcast(self.room_id, &event, None).await {
                    tracing::error!(room_id = self.room_id, error = %e, "message broadcast failed");
                }
            }
            Err(e) => {
                tracing::warn!(room_id = self.room_id, connection_id = %self.connection_id, error = %e, "message rejected");
                self.reply(&OutboundEvent::from_pipeline_error(&e)).await;
            }
        }
    }

    /// Send to this connection only, through its own registry entry.
    async fn reply(&self, event: &OutboundEvent) {
        match self.app.registry.get(self.room_id, self.connection_id).await {
            Some(handle) => self.app.dispatcher.send_to(&handle, event),
            None => tracing::debug!(connection_id = %self.connection_id, "reply dropped, connection not registered"),
        }
    }

    /// Tear the session down. A second call on a closed session is a no-op.
    pub async fn close<T: SessionTransport>(
        &mut self,
        transport: &mut T,
        reason: CloseReason,
    ) -> Result<(), SessionError> {
        let registered = match self.state {
            SessionState::Closed => return Ok(()),
            SessionState::Active => {
                self.transition(SessionState::Closing)?;
                true
            }
            // Never registered, or teardown already under way.
            SessionState::Handshaking | SessionState::Authenticated | SessionState::Closing => false,
        };

        transport.close(&reason).await;
        self.outbound = None;

        if registered {
            self.app.registry.remove(self.room_id, self.connection_id).await;
            if let Some(user) = &self.user {
                tracing::info!(
                    room_id = self.room_id,
                    user = %user.username,
                    connection_id = %self.connection_id,
                    code = reason.code(),
                    "user left room"
                );
                let left = OutboundEvent::left(self.room_id, &user.username);
                if let Err(e) = self.app.dispatcher.broadcast(self.room_id, &left, None).await {
                    tracing::warn!(room_id = self.room_id, error = %e, "leave notice not sent");
                }
            }
        }
        self.transition(SessionState::Closed)
    }

    /// Admit, run and tear down. The session must have passed its handshake.
    pub async fn drive<T: SessionTransport>(mut self, mut transport: T) -> CloseReason {
        if let Err(e) = self.admit().await {
            tracing::error!(room_id = self.room_id, error = %e, "session admission failed");
            let reason = CloseReason::InternalError(e.to_string());
            self.finish(&mut transport, reason.clone()).await;
            return reason;
        }

        let reason = match self.run(&mut transport).await {
            Ok(reason) => reason,
            Err(e) => CloseReason::InternalError(e.to_string()),
        };
        self.finish(&mut transport, reason.clone()).await;
        reason
    }

    async fn finish<T: SessionTransport>(&mut self, transport: &mut T, reason: CloseReason) {
        if let Err(e) = self.close(transport, reason).await {
            tracing::error!(connection_id = %self.connection_id, error = %e, "session teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn allowed_transitions() {
        assert!(Handshaking.can_transition_to(Authenticated));
        assert!(Handshaking.can_transition_to(Closed));
        assert!(Authenticated.can_transition_to(Active));
        assert!(Authenticated.can_transition_to(Closed));
        assert!(Active.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
    }

    #[test]
    fn forbidden_transitions() {
        assert!(!Handshaking.can_transition_to(Active));
        assert!(!Active.can_transition_to(Closed));
        assert!(!Active.can_transition_to(Authenticated));
        assert!(!Closed.can_transition_to(Handshaking));
        assert!(!Closing.can_transition_to(Active));
    }

    #[test]
    fn close_codes() {
        assert_eq!(CloseReason::PolicyViolation("x".into()).code(), 1008);
        assert_eq!(CloseReason::ClientRequested.code(), 1000);
        assert_eq!(CloseReason::Disconnected.code(), 1000);
        assert_eq!(CloseReason::GoingAway.code(), 1001);
        assert_eq!(CloseReason::InternalError("x".into()).code(), 1011);
    }

    #[test]
    fn rejections_map_to_close_reasons() {
        assert_eq!(HandshakeRejection::MissingToken.close_reason().code(), 1008);
        assert_eq!(
            HandshakeRejection::InvalidToken(AuthError::Expired).close_reason().code(),
            1008
        );
        assert_eq!(HandshakeRejection::UnknownRoom.close_reason().code(), 1008);
        assert_eq!(HandshakeRejection::Unavailable.close_reason().code(), 1011);
    }
}
