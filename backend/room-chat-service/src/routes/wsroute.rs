use crate::middleware::auth::bearer_token;
use crate::middleware::error_handling::rejection_response;
use crate::models::RoomId;
use crate::state::AppState;
use crate::websocket::session::{ChatSession, CloseReason, InboundFrame, SessionError, SessionTransport};
use crate::websocket::DeliveryError;
use actix_http::ws::Item;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, Message, MessageStream, Session};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws/rooms/{room_id}?token=...
///
/// The handshake runs before the upgrade, so a refused client gets a plain
/// HTTP error and never sees a socket.
#[get("/ws/rooms/{room_id}")]
pub async fn ws_handler(
    state: web::Data<AppState>,
    path: web::Path<RoomId>,
    query: web::Query<WsParams>,
    req: HttpRequest,
    body: web::Payload,
) -> Result<HttpResponse, Error> {
    let room_id = path.into_inner();
    let token = bearer_token(&req, query.token.as_deref());

    let mut session = ChatSession::new(state.get_ref().clone(), room_id);
    match session.handshake(token.as_deref()).await {
        Ok(()) => {}
        Err(SessionError::Rejected(rejection)) => return Ok(rejection_response(&rejection)),
        Err(e) => {
            tracing::error!(room_id, error = %e, "websocket handshake failed");
            return Err(crate::error::AppError::Internal.into());
        }
    }

    let (response, ws_session, stream) = actix_ws::handle(&req, body)?;

    actix_web::rt::spawn(async move {
        let connection_id = session.connection_id();
        let reason = session.drive(ActixTransport::new(ws_session, stream)).await;
        tracing::debug!(room_id, %connection_id, code = reason.code(), "websocket session ended");
    });

    Ok(response)
}

/// Upper bound on a message reassembled from continuation frames.
pub const MAX_REASSEMBLED_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FragmentError {
    #[error("fragmented message exceeds {MAX_REASSEMBLED_BYTES} bytes")]
    TooLarge,
    #[error("fragmented text is not valid UTF-8")]
    InvalidUtf8,
}

/// Buffers a fragmented message until its last continuation frame.
#[derive(Debug, Default)]
pub struct Fragments {
    partial: Option<(bool, Vec<u8>)>,
}

impl Fragments {
    /// Feed one continuation item; yields the whole frame once it is complete.
    pub fn push(&mut self, item: Item) -> Result<Option<InboundFrame>, FragmentError> {
        let (chunk, last) = match item {
            Item::FirstText(bytes) => {
                self.partial = Some((true, Vec::new()));
                (bytes, false)
            }
            Item::FirstBinary(bytes) => {
                self.partial = Some((false, Vec::new()));
                (bytes, false)
            }
            Item::Continue(bytes) => (bytes, false),
            Item::Last(bytes) => (bytes, true),
        };
        let Some((_, buf)) = self.partial.as_mut() else {
            return Ok(None);
        };
        if buf.len() + chunk.len() > MAX_REASSEMBLED_BYTES {
            self.partial = None;
            return Err(FragmentError::TooLarge);
        }
        buf.extend_from_slice(&chunk);
        if !last {
            return Ok(None);
        }

        match self.partial.take() {
            Some((true, buf)) => String::from_utf8(buf)
                .map(|text| Some(InboundFrame::Text(text)))
                .map_err(|_| FragmentError::InvalidUtf8),
            Some((false, _)) => Ok(Some(InboundFrame::Binary)),
            None => Ok(None),
        }
    }
}

/// `actix-ws` socket adapted to the session's transport seam.
pub struct ActixTransport {
    session: Session,
    stream: MessageStream,
    fragments: Fragments,
}

impl ActixTransport {
    pub fn new(session: Session, stream: MessageStream) -> Self {
        Self {
            session,
            stream,
            fragments: Fragments::default(),
        }
    }
}

#[async_trait(?Send)]
impl SessionTransport for ActixTransport {
    async fn next_frame(&mut self) -> Option<InboundFrame> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(error = %e, "websocket protocol error");
                    return None;
                }
            };
            match msg {
                Message::Text(text) => return Some(InboundFrame::Text(text.to_string())),
                Message::Binary(_) => return Some(InboundFrame::Binary),
                Message::Continuation(item) => match self.fragments.push(item) {
                    Ok(Some(frame)) => return Some(frame),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "dropping fragmented message");
                        return None;
                    }
                },
                Message::Close(_) => return Some(InboundFrame::Close),
                Message::Ping(bytes) => {
                    if self.session.pong(&bytes).await.is_err() {
                        return None;
                    }
                }
                _ => {}
            }
        }
    }

    async fn send_text(&mut self, frame: String) -> Result<(), DeliveryError> {
        self.session
            .text(frame)
            .await
            .map_err(|_| DeliveryError::ConnectionClosed)
    }

    async fn close(&mut self, reason: &CloseReason) {
        let close = actix_ws::CloseReason {
            code: CloseCode::from(reason.code()),
            description: reason.description().map(str::to_string),
        };
        // Already closed by the peer is fine.
        let _ = self.session.clone().close(Some(close)).await;
    }
}
