// Integration tests for the WebSocket messaging channel
//
// Starts the full HTTP router on an ephemeral port and drives it with real
// WebSocket clients:
// - chat broadcast to every connection, sender included
// - targeted notifications
// - silent drop of notifications to absent users
// - malformed and oversized frame handling
// - identity replacement on reconnect

use clipstream_api::http::create_router;
use clipstream_core::messaging::ConnectionRegistry;
use clipstream_core::models::UserId;
use clipstream_core::Config;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> (SocketAddr, ConnectionRegistry) {
    let registry = ConnectionRegistry::new();
    let router = create_router(&Config::default(), registry.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, registry)
}

async fn connect(addr: SocketAddr, user_id: &str) -> WsClient {
    let (socket, _) = connect_async(format!("ws://{addr}/ws/{user_id}"))
        .await
        .unwrap();
    socket
}

async fn send_json(client: &mut WsClient, frame: Value) {
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

async fn recv_json(client: &mut WsClient) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(1), client.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("connection closed while waiting for a frame")
        .unwrap();
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn assert_silent(client: &mut WsClient) {
    let received = tokio::time::timeout(Duration::from_millis(100), client.next()).await;
    assert!(received.is_err(), "expected no frame to arrive");
}

async fn assert_closed(client: &mut WsClient) {
    let outcome = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "connection was not closed");
}

// Registration happens on the server after the upgrade response, so tests
// wait for the registry to catch up before routing frames
async fn wait_for_connections(registry: &ConnectionRegistry, expected: usize) {
    for _ in 0..100 {
        if registry.connection_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {expected} registered connection(s)");
}

async fn wait_for_replacement(registry: &ConnectionRegistry, user_id: &str, original: &str) {
    let user_id = UserId::from_string(user_id.to_string());
    for _ in 0..100 {
        if let Some(handle) = registry.lookup(&user_id) {
            if handle.connection_id != original {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("connection handle was not replaced");
}

#[tokio::test]
async fn test_chat_is_broadcast_to_everyone_including_sender() {
    let (addr, registry) = start_server().await;

    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    let mut carol = connect(addr, "carol").await;
    wait_for_connections(&registry, 3).await;

    send_json(
        &mut alice,
        json!({"type": "chat", "message": "hello everyone"}),
    )
    .await;

    for client in [&mut alice, &mut bob, &mut carol] {
        let frame = recv_json(client).await;
        assert_eq!(frame["type"], "chat");
        assert_eq!(frame["user_id"], "alice");
        assert_eq!(frame["message"], "hello everyone");
        assert!(frame["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_notification_reaches_only_the_target() {
    let (addr, registry) = start_server().await;

    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_connections(&registry, 2).await;

    send_json(
        &mut alice,
        json!({
            "type": "notification",
            "target_user_id": "bob",
            "message": "your upload finished"
        }),
    )
    .await;

    let frame = recv_json(&mut bob).await;
    assert_eq!(frame["type"], "notification");
    assert_eq!(frame["message"], "your upload finished");
    // The target id is not echoed back to the recipient
    assert!(frame.get("target_user_id").is_none());

    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_notification_to_absent_user_is_silently_dropped() {
    let (addr, registry) = start_server().await;

    let mut alice = connect(addr, "alice").await;
    wait_for_connections(&registry, 1).await;

    send_json(
        &mut alice,
        json!({
            "type": "notification",
            "target_user_id": "nobody",
            "message": "anyone there?"
        }),
    )
    .await;
    assert_silent(&mut alice).await;

    // The connection is still healthy afterwards
    send_json(&mut alice, json!({"type": "chat", "message": "ping"})).await;
    assert_eq!(recv_json(&mut alice).await["message"], "ping");
}

#[tokio::test]
async fn test_unrecognized_frame_type_is_skipped() {
    let (addr, registry) = start_server().await;

    let mut alice = connect(addr, "alice").await;
    wait_for_connections(&registry, 1).await;

    send_json(&mut alice, json!({"type": "presence", "status": "away"})).await;
    assert_silent(&mut alice).await;

    send_json(&mut alice, json!({"type": "chat", "message": "ping"})).await;
    assert_eq!(recv_json(&mut alice).await["message"], "ping");
}

#[tokio::test]
async fn test_malformed_frame_terminates_the_connection() {
    let (addr, registry) = start_server().await;

    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_connections(&registry, 2).await;

    bob.send(Message::Text("this is not json".into()))
        .await
        .unwrap();
    assert_closed(&mut bob).await;
    wait_for_connections(&registry, 1).await;

    // The surviving connection keeps chatting
    send_json(&mut alice, json!({"type": "chat", "message": "still up"})).await;
    assert_eq!(recv_json(&mut alice).await["message"], "still up");
}

#[tokio::test]
async fn test_oversized_frame_terminates_the_connection() {
    let (addr, registry) = start_server().await;

    let mut alice = connect(addr, "alice").await;
    wait_for_connections(&registry, 1).await;

    // Default frame cap is 64 KiB
    send_json(
        &mut alice,
        json!({"type": "chat", "message": "x".repeat(128 * 1024)}),
    )
    .await;
    assert_closed(&mut alice).await;
    wait_for_connections(&registry, 0).await;
}

#[tokio::test]
async fn test_second_connection_replaces_the_first() {
    let (addr, registry) = start_server().await;

    let mut first = connect(addr, "alice").await;
    wait_for_connections(&registry, 1).await;
    let original = registry
        .lookup(&UserId::from_string("alice".to_string()))
        .unwrap()
        .connection_id;

    let mut second = connect(addr, "alice").await;
    wait_for_replacement(&registry, "alice", &original).await;

    // Only the replacement handle receives the broadcast
    send_json(&mut second, json!({"type": "chat", "message": "still here"})).await;
    assert_eq!(recv_json(&mut second).await["message"], "still here");
    assert_silent(&mut first).await;
}

#[tokio::test]
async fn test_blank_user_id_is_rejected_before_upgrade() {
    let (addr, _registry) = start_server().await;

    let error = connect_async(format!("ws://{addr}/ws/%20")).await.unwrap_err();
    assert!(matches!(
        error,
        tokio_tungstenite::tungstenite::Error::Http(_)
    ));
}
