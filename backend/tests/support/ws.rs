//! WebSocket-focused test helpers.
//!
//! Sockets need a real listener, so these helpers boot an `HttpServer` on an
//! ephemeral port around a [`Harness`] and speak JSON frames through `awc`.

use std::net::TcpListener;

use actix_web::HttpServer;
use actix_web::dev::ServerHandle;
use awc::BoxedSocket;
use awc::ws::{Codec, Frame, Message};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;

use super::{Harness, TENANT_REF};

pub type WsSocket = actix_codec::Framed<BoxedSocket, Codec>;

/// Serve the harness app on `127.0.0.1:0`; returns the base URL.
pub fn serve(harness: &Harness) -> (String, ServerHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let app_harness = harness.clone();
    let server = HttpServer::new(move || app_harness.clone().into_app())
        .listen(listener)
        .expect("bind test server")
        .disable_signals()
        .workers(1)
        .run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    (format!("http://{addr}"), handle)
}

/// Open a socket for `user` on the primary tenant.
pub async fn connect(base_url: &str, user: &str) -> WsSocket {
    let (_resp, socket) = awc::Client::default()
        .ws(format!("{base_url}/ws/{TENANT_REF}?user_id={user}"))
        .connect()
        .await
        .expect("websocket connect");
    socket
}

pub async fn send_json(socket: &mut WsSocket, frame: Value) {
    socket
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("send text");
}

/// Next text frame as JSON, skipping keep-alive traffic.
pub async fn next_json(socket: &mut WsSocket) -> Value {
    loop {
        let frame = socket.next().await.expect("response frame").expect("frame");
        match frame {
            Frame::Text(bytes) => return serde_json::from_slice(&bytes).expect("json frame"),
            Frame::Ping(_) | Frame::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Subscribe, then round-trip a marker frame so the subscription is known
/// to be registered before the caller continues.
pub async fn subscribe(socket: &mut WsSocket, channel: &str) {
    send_json(
        socket,
        serde_json::json!({"action": "SUBSCRIBE", "channel": channel}),
    )
    .await;
    send_json(
        socket,
        serde_json::json!({
            "action": "BROADCAST",
            "channel": channel,
            "event": "system",
            "payload": {"sync": channel}
        }),
    )
    .await;
    let echo = next_json(socket).await;
    assert_eq!(echo["payload"]["sync"], channel);
}
