//! WebSocket session manager
//!
//! The network layer between the hub and live clients. Each accepted
//! socket runs its own task: handshake, token verification, then a select
//! loop over inbound frames, outbound frames, and the heartbeat timer.
//! A single forwarder task subscribed to `chat.*`, `notification.*`, and
//! `presence.*` routes hub events to the connections of the addressed user
//! and broadcasts presence snapshots.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{
    accept_hdr_async_with_config,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::{frame::coding::CloseCode, CloseFrame, WebSocketConfig},
        Message,
    },
};
use uuid::Uuid;

use crate::hub::{Event, EventHub};
use crate::observability::LifecycleEvent;

use super::auth::TokenVerifier;
use super::errors::{RealtimeError, RealtimeResult};
use super::presence::PresenceSet;
use super::protocol::{ClientFrame, ServerFrame};
use super::session::{Session, SessionState};
use super::UserId;

/// Subscriber id the forwarder registers under
const FORWARDER_ID: &str = "realtime-forwarder";

/// Realtime server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Bind address for the WebSocket listener
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Seconds between server pings; a connection silent for a full
    /// interval after a ping is closed as idle
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Largest websocket frame accepted from a client, in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:4000".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_max_frame_bytes() -> usize {
    65536
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

type FrameSender = mpsc::Sender<ServerFrame>;

/// Handles shared between the accept loop, connection tasks, and forwarder
#[derive(Clone)]
struct ServerShared {
    config: RealtimeConfig,
    hub: Arc<EventHub>,
    verifier: Arc<dyn TokenVerifier>,
    presence: Arc<PresenceSet>,
    connections: Arc<RwLock<HashMap<String, FrameSender>>>,
}

/// WebSocket server
pub struct RealtimeServer {
    shared: ServerShared,
    shutdown_tx: broadcast::Sender<()>,
}

impl RealtimeServer {
    pub fn new(
        config: RealtimeConfig,
        hub: Arc<EventHub>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shared: ServerShared {
                config,
                hub,
                verifier,
                presence: Arc::new(PresenceSet::new()),
                connections: Arc::new(RwLock::new(HashMap::new())),
            },
            shutdown_tx,
        }
    }

    /// The presence set, shared with HTTP introspection
    pub fn presence(&self) -> &Arc<PresenceSet> {
        &self.shared.presence
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> RealtimeResult<()> {
        let addr: SocketAddr = self
            .shared
            .config
            .bind_addr
            .parse()
            .map_err(|e| RealtimeError::ConfigError(format!("Invalid bind address: {}", e)))?;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RealtimeError::ConfigError(format!("Failed to bind: {}", e)))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    ///
    /// Binding is separate from serving so callers can listen on an
    /// ephemeral port and read it back before connecting.
    pub async fn serve(&self, listener: TcpListener) -> RealtimeResult<()> {
        let addr = listener.local_addr().map_err(|e| {
            RealtimeError::ConfigError(format!("Listener address unavailable: {}", e))
        })?;
        LifecycleEvent::RealtimeListening.emit(&[("addr", &addr.to_string())]);

        self.spawn_forwarder();

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let shared = self.shared.clone();
                            tokio::spawn(async move {
                                if let Err(error) = handle_connection(stream, peer_addr, shared).await {
                                    LifecycleEvent::ConnectionClosed.emit(&[
                                        ("error", &error.to_string()),
                                        ("peer", &peer_addr.to_string()),
                                    ]);
                                }
                            });
                        }
                        Err(error) => {
                            LifecycleEvent::AcceptFailed.emit(&[("error", &error.to_string())]);
                        }
                    }
                }

                _ = shutdown_rx.recv() => break,
            }
        }

        self.shared.hub.unsubscribe_all(FORWARDER_ID);
        Ok(())
    }

    /// Stop accepting and wind down
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.shared.connections.read().await.len()
    }

    /// Route hub events to the users they address
    ///
    /// Subscribed once, at server startup, as one channel per pattern.
    fn spawn_forwarder(&self) {
        let shared = self.shared.clone();
        let (_chat, mut chat_rx) = shared.hub.subscribe_channel("chat.*", FORWARDER_ID);
        let (_notification, mut notification_rx) =
            shared.hub.subscribe_channel("notification.*", FORWARDER_ID);
        let (_presence, mut presence_rx) =
            shared.hub.subscribe_channel("presence.*", FORWARDER_ID);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    Some(event) = chat_rx.recv() => event,
                    Some(event) = notification_rx.recv() => event,
                    Some(event) = presence_rx.recv() => event,
                    else => break,
                };
                forward_event(&event, &shared).await;
            }
        });
    }
}

/// Handle a single WebSocket connection from handshake to teardown
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    shared: ServerShared,
) -> RealtimeResult<()> {
    let mut session = Session::new(Uuid::new_v4().to_string());

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(shared.config.max_frame_bytes);
    ws_config.max_frame_size = Some(shared.config.max_frame_bytes);

    // Capture the upgrade request URI; the token rides its query string.
    // Upgrades on any path other than /ws are refused before the switch.
    let mut request_uri: Option<String> = None;
    let ws_stream = accept_hdr_async_with_config(
        stream,
        |request: &Request, response: Response| {
            if request.uri().path() != "/ws" {
                let mut not_found = ErrorResponse::new(None);
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                return Err(not_found);
            }
            request_uri = Some(request.uri().to_string());
            Ok(response)
        },
        Some(ws_config),
    )
    .await
    .map_err(|e| RealtimeError::ConnectionError(format!("WebSocket handshake failed: {}", e)))?;

    session.transition(SessionState::Open)?;
    shared.hub.metrics().increment_connections_opened();
    LifecycleEvent::ConnectionOpen.emit(&[
        ("connection", &session.connection_id),
        ("peer", &peer_addr.to_string()),
    ]);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    session.transition(SessionState::Authenticating)?;
    let user_id = match authenticate(request_uri.as_deref(), shared.verifier.as_ref()) {
        Ok(user_id) => user_id,
        Err(error) => {
            shared.hub.metrics().increment_auth_failures();
            LifecycleEvent::AuthFailed.emit(&[
                ("connection", &session.connection_id),
                ("error", &error.to_string()),
            ]);

            session.transition(SessionState::Closing)?;
            let close = CloseFrame {
                code: CloseCode::from(error.close_code()),
                reason: error.to_string().into(),
            };
            let _ = ws_sender.send(Message::Close(Some(close))).await;
            session.transition(SessionState::Closed)?;

            shared.hub.metrics().increment_connections_closed();
            LifecycleEvent::ConnectionClosed.emit(&[
                ("connection", &session.connection_id),
                ("reason", &error.to_string()),
            ]);
            return Ok(());
        }
    };

    session.bind_user(user_id);
    session.transition(SessionState::Ready)?;
    LifecycleEvent::ConnectionReady.emit(&[
        ("connection", &session.connection_id),
        ("user", &user_id.to_string()),
    ]);

    let (frame_tx, mut frame_rx) = mpsc::channel::<ServerFrame>(256);
    {
        let mut senders = shared.connections.write().await;
        senders.insert(session.connection_id.clone(), frame_tx.clone());
    }

    let first = shared.presence.connect(user_id, &session.connection_id)?;
    shared
        .hub
        .metrics()
        .set_users_online(shared.presence.online_count() as u64);

    // Welcome plus a presence snapshot for the newcomer; everyone else
    // learns about the user through the presence event below
    let _ = frame_tx
        .send(ServerFrame::connected(&session.connection_id, user_id))
        .await;
    let _ = frame_tx
        .send(ServerFrame::online_users(&shared.presence.online_users()))
        .await;

    if first {
        LifecycleEvent::PresenceOnline.emit(&[("user", &user_id.to_string())]);
        let _ = shared.hub.publish(Event::new(
            "realtime",
            "presence.user.online",
            json!({ "userId": user_id }),
        ));
    }

    let mut heartbeat_timer =
        tokio::time::interval(Duration::from_secs(shared.config.heartbeat_interval_secs));
    let mut alive = true;

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        session.touch();
                        alive = true;
                        handle_client_frame(&text, user_id, &shared, &frame_tx).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let frame = ServerFrame::error("UNSUPPORTED", "Binary frames not supported");
                        let _ = frame_tx.send(frame).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        session.touch();
                        alive = true;
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        session.touch();
                        alive = true;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }

            Some(frame) = frame_rx.recv() => {
                // ServerFrame is plain data; serialization cannot fail
                if let Ok(json) = serde_json::to_string(&frame) {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                    shared.hub.metrics().increment_frames_out();
                }
            }

            _ = heartbeat_timer.tick() => {
                if !alive {
                    LifecycleEvent::HeartbeatTimeout.emit(&[
                        ("connection", &session.connection_id),
                        ("idle_secs", &session.idle_for().as_secs().to_string()),
                    ]);
                    let close = CloseFrame {
                        code: CloseCode::from(RealtimeError::IdleTimeout.close_code()),
                        reason: RealtimeError::IdleTimeout.to_string().into(),
                    };
                    let _ = ws_sender.send(Message::Close(Some(close))).await;
                    break;
                }
                alive = false;
                if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    session.transition(SessionState::Closing)?;
    {
        let mut senders = shared.connections.write().await;
        senders.remove(&session.connection_id);
    }

    let last = shared.presence.disconnect(user_id, &session.connection_id)?;
    shared
        .hub
        .metrics()
        .set_users_online(shared.presence.online_count() as u64);
    if last {
        LifecycleEvent::PresenceOffline.emit(&[("user", &user_id.to_string())]);
        let _ = shared.hub.publish(Event::new(
            "realtime",
            "presence.user.offline",
            json!({ "userId": user_id }),
        ));
    }

    session.transition(SessionState::Closed)?;
    shared.hub.metrics().increment_connections_closed();
    LifecycleEvent::ConnectionClosed.emit(&[
        ("connection", &session.connection_id),
        ("user", &user_id.to_string()),
    ]);
    Ok(())
}

/// Parse an inbound text frame and republish it on the hub
async fn handle_client_frame(
    text: &str,
    user_id: UserId,
    shared: &ServerShared,
    frame_tx: &FrameSender,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(error) => {
            let error = RealtimeError::InvalidFrame(error.to_string());
            shared.hub.metrics().increment_frames_dropped();
            LifecycleEvent::FrameDropped.emit(&[("error", &error.to_string())]);
            let _ = frame_tx
                .send(ServerFrame::error("INVALID_FRAME", &error.to_string()))
                .await;
            return;
        }
    };

    shared.hub.metrics().increment_frames_in();
    if let Err(error) = shared.hub.publish(frame.into_hub_event(user_id)) {
        let _ = frame_tx
            .send(ServerFrame::error("PUBLISH_REJECTED", &error.to_string()))
            .await;
    }
}

/// Route one hub event to connected clients
async fn forward_event(event: &Arc<Event>, shared: &ServerShared) {
    // Presence changes turn into online_users broadcasts rather than
    // per-user forwards
    if event.event_type.starts_with("presence.") {
        broadcast_online_users(shared).await;
        return;
    }

    let Some(target) = forward_target(event) else {
        return;
    };

    let delivered = forward_to_user(target, &ServerFrame::event(event), shared).await;

    // A chat message that reached at least one device earns the sender a
    // delivered receipt, published as a derived event
    if delivered > 0 && event.event_type == "chat.message.sent" {
        let receipt = Event::new(
            "realtime",
            "chat.message.delivered",
            json!({
                "senderId": event.data["senderId"],
                "recipientId": event.data["recipientId"],
                "eventId": event.id,
            }),
        );
        if let Err(error) = shared.hub.publish_derived(event, receipt) {
            LifecycleEvent::ForwardFailed.emit(&[
                ("error", &error.to_string()),
                ("type", "chat.message.delivered"),
            ]);
        }
    }
}

/// The user an event is addressed to, if it is addressed at all
///
/// Read receipts and delivered receipts flow back to the original message
/// author; everything else goes to the recipient.
fn forward_target(event: &Event) -> Option<UserId> {
    let field = match event.event_type.as_str() {
        "chat.message.read" | "chat.message.delivered" => "senderId",
        _ => "recipientId",
    };
    event.data.get(field).and_then(Value::as_u64)
}

/// Send a frame to every connection of one user, returning how many took it
async fn forward_to_user(user_id: UserId, frame: &ServerFrame, shared: &ServerShared) -> usize {
    let connection_ids = shared.presence.connections_for(user_id);
    if connection_ids.is_empty() {
        return 0;
    }

    let mut delivered = 0;
    let senders = shared.connections.read().await;
    for connection_id in connection_ids {
        let Some(sender) = senders.get(&connection_id) else {
            continue;
        };
        if sender.try_send(frame.clone()).is_ok() {
            delivered += 1;
        } else {
            shared.hub.metrics().increment_frames_dropped();
            LifecycleEvent::FrameDropped.emit(&[
                ("connection", &connection_id),
                ("type", &frame.frame_type),
            ]);
        }
    }
    delivered
}

/// Push the current presence snapshot to every connection
async fn broadcast_online_users(shared: &ServerShared) {
    let frame = ServerFrame::online_users(&shared.presence.online_users());

    let senders = shared.connections.read().await;
    for (connection_id, sender) in senders.iter() {
        if sender.try_send(frame.clone()).is_err() {
            shared.hub.metrics().increment_frames_dropped();
            LifecycleEvent::FrameDropped.emit(&[
                ("connection", connection_id),
                ("type", "online_users"),
            ]);
        }
    }
}

/// Pull the credential token out of a request URI's query string
fn query_token(uri: &str) -> Option<String> {
    let (_, query) = uri.split_once('?')?;
    query.split('&').find_map(|pair| {
        let value = pair.strip_prefix("token=")?;
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}

fn authenticate(
    request_uri: Option<&str>,
    verifier: &dyn TokenVerifier,
) -> RealtimeResult<UserId> {
    let token = request_uri
        .and_then(query_token)
        .ok_or(RealtimeError::MissingToken)?;
    verifier.verify(&token)
}
