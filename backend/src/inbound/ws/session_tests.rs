//! WebSocket session handler tests.
//!
//! Each test boots a real server over the in-memory backend and talks to it
//! with `awc`, so subscriptions, fan-out and presence run end to end.

use super::*;
use crate::domain::{AdmissionService, Project, RealtimeHub, RealtimeService};
use crate::inbound::ws;
use crate::inbound::ws::state::WsState;
use crate::outbound::memory::InMemoryBackend;
use actix_web::{App, HttpServer, dev::Server};
use awc::{BoxedSocket, ws::Codec, ws::Frame, ws::Message as ClientFrame};
use futures_util::{SinkExt, StreamExt};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use uuid::Uuid;

type WsSocket = actix_codec::Framed<BoxedSocket, Codec>;

struct TestServer {
    url: String,
    server: Server,
}

#[fixture]
async fn start_ws_server() -> TestServer {
    let backend = Arc::new(InMemoryBackend::new());
    backend
        .seed_project(Project {
            id: TenantId::random(),
            reference_id: "acme".to_owned(),
            owner_id: Uuid::new_v4(),
            name: "Acme".to_owned(),
            active: true,
        })
        .await;
    let admission = AdmissionService::new(Arc::clone(&backend), Arc::clone(&backend));
    let realtime = RealtimeService::new(
        Arc::new(RealtimeHub::new()),
        Arc::clone(&backend),
        Arc::clone(&backend),
        Arc::clone(&backend),
        Arc::clone(&backend),
    );
    let ws_state = WsState::new(Arc::new(admission), Arc::new(realtime));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(actix_web::web::Data::new(ws_state.clone()))
            .service(ws::ws_project_entry)
    })
    .listen(listener)
    .expect("bind test server")
    .disable_signals()
    .run();
    TestServer {
        url: format!("http://{addr}"),
        server,
    }
}

#[fixture]
async fn running_server(#[future] start_ws_server: TestServer) -> String {
    let TestServer { url, server } = start_ws_server.await;
    actix_web::rt::spawn(server);
    url
}

async fn connect(url: &str, user: &str) -> WsSocket {
    let (_resp, socket) = awc::Client::default()
        .ws(format!("{url}/ws/acme?user_id={user}"))
        .connect()
        .await
        .expect("websocket connect");
    socket
}

async fn send(socket: &mut WsSocket, frame: Value) {
    socket
        .send(ClientFrame::Text(frame.to_string().into()))
        .await
        .expect("send text");
}

async fn next_json_frame(socket: &mut WsSocket) -> Value {
    loop {
        let frame = socket.next().await.expect("response frame").expect("frame");
        match frame {
            Frame::Text(bytes) => return serde_json::from_slice(&bytes).expect("json frame"),
            Frame::Ping(_) | Frame::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Subscribe and wait for an echo, so later frames from other connections
/// are guaranteed to find the subscription in the registry.
async fn subscribe(socket: &mut WsSocket, channel: &str) {
    send(socket, json!({"action": "SUBSCRIBE", "channel": channel})).await;
    send(
        socket,
        json!({"action": "BROADCAST", "channel": channel, "event": "system", "payload": {"sync": channel}}),
    )
    .await;
    let echo = next_json_frame(socket).await;
    assert_eq!(echo["payload"]["sync"], channel);
}

#[rstest]
#[actix_rt::test]
async fn broadcasts_reach_subscribers(#[future] running_server: String) {
    let url = running_server.await;
    let mut alice = connect(&url, "alice").await;
    let mut bob = connect(&url, "bob").await;
    subscribe(&mut alice, "chat").await;

    send(
        &mut bob,
        json!({"action": "BROADCAST", "channel": "chat", "event": "message", "payload": {"text": "hi"}}),
    )
    .await;

    let frame = next_json_frame(&mut alice).await;
    assert_eq!(frame["channel"], "chat");
    assert_eq!(frame["event_type"], "custom");
    assert_eq!(frame["payload"], json!({"text": "hi"}));
    assert_eq!(frame["sender_id"], "bob");
    assert!(frame["timestamp"].is_string());
}

#[rstest]
#[actix_rt::test]
async fn frames_stay_on_their_channel(#[future] running_server: String) {
    let url = running_server.await;
    let mut alice = connect(&url, "alice").await;
    let mut bob = connect(&url, "bob").await;
    subscribe(&mut alice, "news").await;

    send(
        &mut bob,
        json!({"action": "BROADCAST", "channel": "sports", "payload": {"n": 1}}),
    )
    .await;
    send(
        &mut bob,
        json!({"action": "BROADCAST", "channel": "news", "payload": {"n": 2}}),
    )
    .await;

    let frame = next_json_frame(&mut alice).await;
    assert_eq!(frame["channel"], "news");
    assert_eq!(frame["payload"]["n"], 2);
}

#[rstest]
#[actix_rt::test]
async fn unsubscribed_channels_go_quiet(#[future] running_server: String) {
    let url = running_server.await;
    let mut alice = connect(&url, "alice").await;
    let mut bob = connect(&url, "bob").await;
    subscribe(&mut alice, "chat").await;
    send(&mut alice, json!({"action": "UNSUBSCRIBE", "channel": "chat"})).await;
    subscribe(&mut alice, "alerts").await;

    send(
        &mut bob,
        json!({"action": "BROADCAST", "channel": "chat", "payload": {"n": 1}}),
    )
    .await;
    send(
        &mut bob,
        json!({"action": "BROADCAST", "channel": "alerts", "payload": {"n": 2}}),
    )
    .await;

    let frame = next_json_frame(&mut alice).await;
    assert_eq!(frame["channel"], "alerts");
}

#[rstest]
#[actix_rt::test]
async fn malformed_frames_are_ignored(#[future] running_server: String) {
    let url = running_server.await;
    let mut alice = connect(&url, "alice").await;
    alice
        .send(ClientFrame::Text("not-json".into()))
        .await
        .expect("send text");
    send(&mut alice, json!({"action": "DANCE", "channel": "chat"})).await;
    send(&mut alice, json!({"action": "SUBSCRIBE", "channel": ""})).await;

    subscribe(&mut alice, "chat").await;
}

#[rstest]
#[actix_rt::test]
async fn unknown_projects_are_refused(#[future] running_server: String) {
    let url = running_server.await;
    let result = awc::Client::default()
        .ws(format!("{url}/ws/ghost"))
        .connect()
        .await;
    assert!(result.is_err(), "handshake should fail for unknown projects");
}

#[rstest]
#[actix_rt::test]
async fn closes_after_timeout_without_client_messages(#[future] running_server: String) {
    let url = running_server.await;
    let mut socket = connect(&url, "idle").await;
    tokio::time::sleep(CLIENT_TIMEOUT + HEARTBEAT_INTERVAL * 3).await;

    let observed_close = tokio::time::timeout(Duration::from_secs(2), async {
        let mut observed = None;
        while let Some(frame) = socket.next().await {
            let frame = frame.expect("frame");
            match frame {
                Frame::Ping(_) | Frame::Pong(_) => continue,
                Frame::Close(reason) => {
                    observed = reason;
                    break;
                }
                other => panic!("unexpected frame before close: {other:?}"),
            }
        }
        observed
    })
    .await
    .expect("close frame missing within timeout")
    .expect("close frame missing after timeout");

    assert_eq!(observed_close.code, CloseCode::Normal);
    assert_eq!(
        observed_close.description.as_deref(),
        Some("heartbeat timeout")
    );
}
