//! Per-connection WebSocket handler.
//!
//! Each connection runs two tasks. The writer drains the hub's bounded
//! outbound queue and pings every 30s; the reader handles client frames and
//! closes a connection that has been silent for 60s. The reader owns
//! teardown: removing the registration drops the queue, which stops the
//! writer. Tests shorten both intervals.
//!
//! Malformed client frames are logged and dropped; they never terminate the
//! connection.

use std::sync::Arc;
use std::time::Duration;

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};

use crate::domain::ports::LiveChannels;
use crate::domain::{BroadcastFrame, ChannelName, ClientId, ConnectionId, TenantId, TraceId};
use crate::inbound::ws::messages::ClientMessage;

/// Time between keep-alive pings (30s in production, shorter in tests).
#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Max silence before disconnecting the client (60s in production, shorter in tests).
#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(500);

pub(super) async fn handle_ws_session(
    live: Arc<dyn LiveChannels>,
    tenant_id: TenantId,
    client_id: ClientId,
    mut session: Session,
    mut stream: MessageStream,
) {
    let registration = live.connect(tenant_id, client_id).await;
    let connection_id = registration.connection_id;
    info!(
        %tenant_id,
        %connection_id,
        client_id = %registration.client_id,
        "realtime client connected"
    );
    let writer = actix_web::rt::spawn(write_frames(
        session.clone(),
        connection_id,
        registration.frames,
    ));

    let reader = WsReader {
        live,
        tenant_id,
        connection_id,
        client_id: registration.client_id,
    };
    let error = reader.run(&mut session, &mut stream).await;

    reader.log_shutdown_reason(&error);
    reader.live.disconnect(tenant_id, connection_id).await;
    if let Err(error) = writer.await {
        warn!(%connection_id, error = %error, "WebSocket writer task failed");
    }
    close_session_if_needed(session, close_action_for(&error)).await;
}

/// Writer half: forwards queued frames and keeps the peer alive.
///
/// Ends when the queue closes or a send fails.
async fn write_frames(
    mut session: Session,
    connection_id: ConnectionId,
    mut frames: mpsc::Receiver<Arc<BroadcastFrame>>,
) {
    let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);
    let outcome = loop {
        let result = tokio::select! {
            _ = heartbeat.tick() => session.ping(b"").await.map_err(SessionError::Network),
            frame = frames.recv() => forward_frame(&mut session, frame).await,
        };
        if let Err(error) = result {
            break error;
        }
    };
    match outcome {
        SessionError::Network(error) => {
            debug!(%connection_id, error = %error, "WebSocket send failed; writer stopping");
        }
        _ => debug!(%connection_id, "outbound queue closed; writer stopping"),
    }
}

async fn forward_frame(
    session: &mut Session,
    frame: Option<Arc<BroadcastFrame>>,
) -> Result<(), SessionError> {
    let Some(frame) = frame else {
        return Err(SessionError::QueueClosed);
    };
    match serde_json::to_string(frame.as_ref()) {
        Ok(body) => session.text(body).await.map_err(SessionError::Network),
        Err(error) => {
            warn!(error = %error, channel = %frame.channel, "failed to serialise broadcast frame");
            Ok(())
        }
    }
}

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    QueueClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

fn close_action_for(error: &SessionError) -> CloseAction {
    match error {
        SessionError::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Normal,
            description: Some("heartbeat timeout".to_owned()),
        })),
        SessionError::Protocol(_) => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Protocol,
            description: Some("protocol error".to_owned()),
        })),
        SessionError::QueueClosed => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Away,
            description: None,
        })),
        SessionError::ClientClosed(reason) => CloseAction::Close(reason.clone()),
        SessionError::StreamClosed | SessionError::Network(_) => CloseAction::None,
    }
}

async fn close_session_if_needed(session: Session, close_action: CloseAction) {
    if let CloseAction::Close(reason) = close_action {
        if let Err(error) = session.close(reason).await {
            debug!(error = %error, "WebSocket already closed");
        }
    }
}

/// Reader half: client frames and the idle deadline.
struct WsReader {
    live: Arc<dyn LiveChannels>,
    tenant_id: TenantId,
    connection_id: ConnectionId,
    client_id: ClientId,
}

impl WsReader {
    async fn run(&self, session: &mut Session, stream: &mut MessageStream) -> SessionError {
        loop {
            let Ok(message) = time::timeout(CLIENT_TIMEOUT, stream.recv()).await else {
                return SessionError::HeartbeatTimeout;
            };
            if let Err(error) = self.handle_stream_message(session, message).await {
                return error;
            }
        }
    }

    async fn handle_stream_message(
        &self,
        session: &mut Session,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let Some(message) = message else {
            return Err(SessionError::StreamClosed);
        };

        match message {
            Ok(message) => self.handle_message(session, message).await,
            Err(error) => Err(SessionError::Protocol(error)),
        }
    }

    async fn handle_message(
        &self,
        session: &mut Session,
        message: Message,
    ) -> Result<(), SessionError> {
        match message {
            Message::Ping(payload) => session.pong(&payload).await.map_err(SessionError::Network),
            Message::Text(text) => {
                TraceId::scope(TraceId::generate(), self.handle_text_message(text.as_ref())).await;
                Ok(())
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                Ok(())
            }
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
        }
    }

    async fn handle_text_message(&self, text: &str) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(error) => {
                debug!(error = %error, connection_id = %self.connection_id, "dropped malformed frame");
                return;
            }
        };
        let name = match ChannelName::new(message.channel()) {
            Ok(name) => name,
            Err(error) => {
                debug!(error = %error, connection_id = %self.connection_id, "dropped frame for invalid channel");
                return;
            }
        };

        match message {
            ClientMessage::Subscribe { .. } => {
                self.live
                    .subscribe(self.tenant_id, self.connection_id, name)
                    .await;
            }
            ClientMessage::Unsubscribe { .. } => {
                self.live
                    .unsubscribe(self.tenant_id, self.connection_id, name)
                    .await;
            }
            ClientMessage::Broadcast { event, payload, .. } => {
                let delivered = self
                    .live
                    .broadcast(
                        self.tenant_id,
                        name,
                        event,
                        payload,
                        Some(self.client_id.to_string()),
                    )
                    .await;
                debug!(connection_id = %self.connection_id, delivered, "client broadcast");
            }
        }
    }

    fn log_shutdown_reason(&self, error: &SessionError) {
        let connection_id = self.connection_id;
        match error {
            SessionError::HeartbeatTimeout => {
                warn!(%connection_id, "WebSocket heartbeat timeout; closing connection");
            }
            SessionError::Protocol(error) => {
                warn!(%connection_id, error = %error, "WebSocket protocol error");
            }
            SessionError::Network(error) => {
                warn!(%connection_id, error = %error, "WebSocket send failed; closing connection");
            }
            SessionError::QueueClosed => {
                warn!(%connection_id, "outbound queue closed; closing connection");
            }
            SessionError::ClientClosed(_) | SessionError::StreamClosed => {
                info!(%connection_id, "realtime client disconnected");
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
