//! End-to-end realtime session tests
//!
//! Boots the WebSocket server on an ephemeral port and drives it with raw
//! tungstenite clients:
//! - Handshake auth and 4xxx close codes
//! - Welcome frames and online-user broadcasts
//! - Presence transitions for multi-device users
//! - Chat routing, delivery receipts, and malformed-frame handling

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame, Message},
        Error as WsError,
    },
    MaybeTlsStream, WebSocketStream,
};

use plexus::hub::{EventHub, HubConfig};
use plexus::realtime::{RealtimeConfig, RealtimeServer, StaticTokenVerifier, TokenVerifier};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ALICE: u64 = 1;
const BOB: u64 = 2;

/// Boot a server on 127.0.0.1:0 with static tokens for alice and bob.
async fn start_server() -> (Arc<RealtimeServer>, Arc<EventHub>, String) {
    let hub = Arc::new(EventHub::new(HubConfig::default()));
    let verifier: Arc<dyn TokenVerifier> = Arc::new(
        StaticTokenVerifier::new()
            .with_token("alice-token", ALICE)
            .with_token("bob-token", BOB),
    );
    let server = Arc::new(RealtimeServer::new(
        RealtimeConfig::default(),
        Arc::clone(&hub),
        verifier,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serve_server = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = serve_server.serve(listener).await;
    });

    (server, hub, format!("ws://{}/ws", addr))
}

async fn connect(url: &str, token: &str) -> WsClient {
    let (ws, _response) = connect_async(format!("{}?token={}", url, token))
        .await
        .expect("connection failed");
    ws
}

/// Next text frame as JSON, skipping pings.
async fn next_frame(ws: &mut WsClient) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        match message {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("frame is not valid json")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message: {:?}", other),
        }
    }
}

/// Read until a forwarded hub event of the given type arrives.
async fn wait_for_event(ws: &mut WsClient, event_type: &str) -> Value {
    loop {
        let frame = next_frame(ws).await;
        if frame["type"] == "event" && frame["payload"]["type"] == event_type {
            return frame["payload"].clone();
        }
    }
}

/// Read until an `online_users` frame matches the expected id set.
async fn wait_for_online_users(ws: &mut WsClient, expected: &[u64]) {
    loop {
        let frame = next_frame(ws).await;
        if frame["type"] == "online_users" {
            let ids: Vec<u64> = frame["payload"]["userIds"]
                .as_array()
                .expect("userIds missing")
                .iter()
                .filter_map(Value::as_u64)
                .collect();
            if ids == expected {
                return;
            }
        }
    }
}

/// Read until the server closes, returning the close frame.
async fn wait_for_close(ws: &mut WsClient) -> Option<CloseFrame<'static>> {
    loop {
        match timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for close")
        {
            Some(Ok(Message::Close(frame))) => return frame,
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

// =============================================================================
// Handshake & Auth
// =============================================================================

/// A verified session is welcomed with `connected` then `online_users`.
#[tokio::test]
async fn test_handshake_delivers_connected_then_online_users() {
    let (_server, _hub, url) = start_server().await;

    let mut ws = connect(&url, "alice-token").await;

    let connected = next_frame(&mut ws).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["payload"]["userId"], ALICE);
    assert!(connected["payload"]["connectionId"].is_string());

    let online = next_frame(&mut ws).await;
    assert_eq!(online["type"], "online_users");
    assert_eq!(online["payload"]["userIds"], json!([ALICE]));
}

/// Connecting without a token closes with the missing-token code.
#[tokio::test]
async fn test_missing_token_closed_with_4001() {
    let (_server, _hub, url) = start_server().await;

    let (mut ws, _) = connect_async(url.as_str()).await.expect("handshake");

    let close = wait_for_close(&mut ws).await.expect("expected close frame");
    assert_eq!(close.code, CloseCode::Library(4001));
}

/// An unverifiable token closes with the auth-failed code.
#[tokio::test]
async fn test_invalid_token_closed_with_4003() {
    let (_server, _hub, url) = start_server().await;

    let mut ws = connect(&url, "forged-token").await;

    let close = wait_for_close(&mut ws).await.expect("expected close frame");
    assert_eq!(close.code, CloseCode::Library(4003));
}

/// Upgrade requests on any path other than /ws are refused with a 404.
#[tokio::test]
async fn test_unknown_upgrade_path_rejected() {
    let (_server, _hub, url) = start_server().await;

    let wrong_path = url.replace("/ws", "/events");
    match connect_async(format!("{}?token=alice-token", wrong_path)).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 404),
        other => panic!("expected http rejection, got {:?}", other),
    }
}

// =============================================================================
// Presence
// =============================================================================

/// A user with two live connections goes offline exactly once, when the
/// last connection closes.
#[tokio::test]
async fn test_exactly_one_offline_event_per_multi_device_user() {
    let (server, hub, url) = start_server().await;
    let (_handle, mut presence_rx) = hub.subscribe_channel("presence.*", "probe");

    let mut phone = connect(&url, "alice-token").await;
    let mut laptop = connect(&url, "alice-token").await;
    next_frame(&mut phone).await;
    next_frame(&mut laptop).await;

    // First connection online, second silent
    let online = timeout(Duration::from_secs(2), presence_rx.recv())
        .await
        .expect("no online event")
        .unwrap();
    assert_eq!(online.event_type, "presence.user.online");
    assert_eq!(online.data["userId"], ALICE);

    phone.close(None).await.unwrap();
    while server.connection_count().await > 1 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(
        timeout(Duration::from_millis(200), presence_rx.recv())
            .await
            .is_err(),
        "closing one of two devices must not publish presence events"
    );

    laptop.close(None).await.unwrap();
    let offline = timeout(Duration::from_secs(2), presence_rx.recv())
        .await
        .expect("no offline event")
        .unwrap();
    assert_eq!(offline.event_type, "presence.user.offline");
    assert_eq!(offline.data["userId"], ALICE);

    assert!(
        timeout(Duration::from_millis(200), presence_rx.recv())
            .await
            .is_err(),
        "offline must be published exactly once"
    );
}

/// Every connected client sees the online set change on connect and close.
#[tokio::test]
async fn test_online_users_broadcast_tracks_connections() {
    let (_server, _hub, url) = start_server().await;

    let mut alice = connect(&url, "alice-token").await;
    wait_for_online_users(&mut alice, &[ALICE]).await;

    let mut bob = connect(&url, "bob-token").await;
    wait_for_online_users(&mut bob, &[ALICE, BOB]).await;
    wait_for_online_users(&mut alice, &[ALICE, BOB]).await;

    bob.close(None).await.unwrap();
    wait_for_online_users(&mut alice, &[ALICE]).await;
}

// =============================================================================
// Chat Routing
// =============================================================================

/// A message frame reaches the recipient as a hub event and earns the
/// sender a derived delivery receipt.
#[tokio::test]
async fn test_message_routed_to_recipient_with_delivery_receipt() {
    let (_server, hub, url) = start_server().await;

    let mut alice = connect(&url, "alice-token").await;
    let mut bob = connect(&url, "bob-token").await;
    next_frame(&mut alice).await;
    next_frame(&mut bob).await;

    send_json(
        &mut alice,
        json!({
            "type": "message",
            "payload": {"recipientId": BOB, "content": "hi bob", "conversationId": 7}
        }),
    )
    .await;

    let delivered = wait_for_event(&mut bob, "chat.message.sent").await;
    assert_eq!(delivered["data"]["senderId"], ALICE);
    assert_eq!(delivered["data"]["content"], "hi bob");
    assert_eq!(delivered["data"]["conversationId"], 7);

    // The receipt is a derived event, one causal step down
    let receipt = wait_for_event(&mut alice, "chat.message.delivered").await;
    assert_eq!(receipt["data"]["recipientId"], BOB);
    assert_eq!(receipt["propagationDepth"], 1);

    assert!(hub
        .history()
        .iter()
        .any(|e| e.event_type == "chat.message.sent"));
}

/// Typing indicators reach the recipient but never spawn receipts.
#[tokio::test]
async fn test_typing_indicator_forwarded_without_receipt() {
    let (_server, _hub, url) = start_server().await;

    let mut alice = connect(&url, "alice-token").await;
    let mut bob = connect(&url, "bob-token").await;
    next_frame(&mut alice).await;
    next_frame(&mut bob).await;

    send_json(
        &mut alice,
        json!({
            "type": "typing",
            "payload": {"recipientId": BOB, "isTyping": true}
        }),
    )
    .await;

    let typing = wait_for_event(&mut bob, "chat.typing.changed").await;
    assert_eq!(typing["data"]["senderId"], ALICE);
    assert_eq!(typing["data"]["isTyping"], true);
    assert_eq!(typing["priority"], "low");
    assert_eq!(typing["propagate"], false);
}

/// Read receipts are addressed to the original message author.
#[tokio::test]
async fn test_read_receipt_routed_to_author() {
    let (_server, _hub, url) = start_server().await;

    let mut alice = connect(&url, "alice-token").await;
    let mut bob = connect(&url, "bob-token").await;
    next_frame(&mut alice).await;
    next_frame(&mut bob).await;

    // Bob acknowledges a message alice authored
    send_json(
        &mut bob,
        json!({
            "type": "read",
            "payload": {"senderId": ALICE, "messageId": 9001}
        }),
    )
    .await;

    let read = wait_for_event(&mut alice, "chat.message.read").await;
    assert_eq!(read["data"]["readerId"], BOB);
    assert_eq!(read["data"]["messageId"], 9001);
}

/// A malformed frame earns an error frame, not a disconnect.
#[tokio::test]
async fn test_invalid_frame_answered_with_error_frame() {
    let (_server, _hub, url) = start_server().await;

    let mut alice = connect(&url, "alice-token").await;
    let mut bob = connect(&url, "bob-token").await;
    next_frame(&mut alice).await;
    next_frame(&mut bob).await;

    alice
        .send(Message::Text("this is not json".to_string()))
        .await
        .unwrap();

    loop {
        let frame = next_frame(&mut alice).await;
        if frame["type"] == "error" {
            assert_eq!(frame["payload"]["code"], "INVALID_FRAME");
            break;
        }
    }

    // The session survived: routing still works
    send_json(
        &mut alice,
        json!({
            "type": "message",
            "payload": {"recipientId": BOB, "content": "still here"}
        }),
    )
    .await;

    let message = wait_for_event(&mut bob, "chat.message.sent").await;
    assert_eq!(message["data"]["content"], "still here");
}
