//! Reconnecting WebSocket client
//!
//! A worker task owns the socket and the reconnect loop; callers hold a
//! cheap handle that queues outbound frames and reads shared state. The
//! loop retries dropped connections on the controller's schedule and
//! stops for clean closes and auth rejections.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};

use crate::client::controller::{NextStep, ReconnectController};
use crate::client::policy::ReconnectPolicy;
use crate::observability::LifecycleEvent;
use crate::realtime::protocol::{
    ClientFrame, MessagePayload, ReadPayload, ServerFrame, TypingPayload,
};
use crate::realtime::UserId;

/// Connection settings for one client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server endpoint, e.g. `ws://127.0.0.1:4000/ws`
    pub url: String,
    /// Token presented during the handshake
    pub token: String,
    /// Retry schedule for dropped connections
    pub policy: ReconnectPolicy,
}

impl ClientConfig {
    fn request_url(&self) -> String {
        format!("{}?token={}", self.url, self.token)
    }
}

/// Instruction from the handle to the worker
enum Command {
    Frame(ClientFrame),
    Close,
}

/// How a session ended, which decides whether the worker retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionOutcome {
    /// User-initiated close; no retry
    Clean,
    /// Server rejected the token; retrying would loop forever
    AuthRejected,
    /// Anything else, including server-side closes; retry
    Dropped,
}

/// Handle to a running client worker
///
/// Cloning is cheap; all clones feed the same socket. Send methods
/// return `false` when the session is not ready, mirroring a send
/// against a closed socket.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    outbound_tx: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
    online_users: Arc<RwLock<Vec<UserId>>>,
}

impl RealtimeClient {
    /// Spawns the worker and returns the handle plus the inbound frame
    /// stream
    ///
    /// The receiver yields every frame the server pushes. Dropping it
    /// ends the session cleanly on the next inbound frame.
    pub fn connect(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let online_users = Arc::new(RwLock::new(Vec::new()));

        let worker = ClientWorker {
            controller: ReconnectController::new(config.policy),
            config,
            outbound_rx,
            frames_tx,
            connected: Arc::clone(&connected),
            online_users: Arc::clone(&online_users),
        };
        tokio::spawn(worker.run());

        (
            Self {
                outbound_tx,
                connected,
                online_users,
            },
            frames_rx,
        )
    }

    /// Whether the session has reached ready and not since dropped
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Latest presence snapshot pushed by the server
    pub fn online_users(&self) -> Vec<UserId> {
        self.online_users
            .read()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Queues a chat message for the addressed user
    pub fn send_message(
        &self,
        recipient_id: UserId,
        content: &str,
        conversation_id: Option<u64>,
    ) -> bool {
        self.send_frame(ClientFrame::Message(MessagePayload {
            recipient_id,
            content: content.to_string(),
            conversation_id,
        }))
    }

    /// Queues a typing indicator change
    pub fn send_typing(&self, recipient_id: UserId, is_typing: bool) -> bool {
        self.send_frame(ClientFrame::Typing(TypingPayload {
            recipient_id,
            is_typing,
        }))
    }

    /// Queues a read receipt for the message's author
    pub fn send_read_receipt(&self, sender_id: UserId, message_id: u64) -> bool {
        self.send_frame(ClientFrame::Read(ReadPayload {
            sender_id,
            message_id,
        }))
    }

    /// Closes the session without scheduling a retry
    pub fn disconnect(&self) {
        let _ = self.outbound_tx.send(Command::Close);
    }

    fn send_frame(&self, frame: ClientFrame) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.outbound_tx.send(Command::Frame(frame)).is_ok()
    }
}

/// Task that owns the socket across reconnects
struct ClientWorker {
    config: ClientConfig,
    controller: ReconnectController,
    outbound_rx: mpsc::UnboundedReceiver<Command>,
    frames_tx: mpsc::UnboundedSender<ServerFrame>,
    connected: Arc<AtomicBool>,
    online_users: Arc<RwLock<Vec<UserId>>>,
}

impl ClientWorker {
    async fn run(mut self) {
        loop {
            self.controller.on_attempt();
            let outcome = match connect_async(self.config.request_url()).await {
                Ok((stream, _response)) => self.run_session(stream).await,
                Err(_) => SessionOutcome::Dropped,
            };
            self.connected.store(false, Ordering::SeqCst);

            match outcome {
                SessionOutcome::Clean => {
                    self.controller.on_clean_close();
                    break;
                }
                SessionOutcome::AuthRejected => {
                    LifecycleEvent::AuthFailed.emit(&[("url", &self.config.url)]);
                    break;
                }
                SessionOutcome::Dropped => match self.controller.on_failure() {
                    NextStep::RetryAfter(delay) => {
                        LifecycleEvent::ReconnectScheduled.emit(&[
                            ("delay_ms", &delay.as_millis().to_string()),
                            ("failures", &self.controller.failures().to_string()),
                        ]);
                        tokio::time::sleep(delay).await;
                    }
                    NextStep::Stop => {
                        LifecycleEvent::ReconnectGaveUp
                            .emit(&[("failures", &self.controller.failures().to_string())]);
                        break;
                    }
                },
            }
        }
    }

    async fn run_session(
        &mut self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> SessionOutcome {
        let (mut ws_sender, mut ws_receiver) = stream.split();

        loop {
            tokio::select! {
                inbound = ws_receiver.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        // Frames we cannot parse are skipped, not fatal
                        if let Ok(frame) = serde_json::from_str::<ServerFrame>(&text) {
                            self.observe(&frame);
                            if self.frames_tx.send(frame).is_err() {
                                let _ = ws_sender.send(Message::Close(None)).await;
                                return SessionOutcome::Clean;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            return SessionOutcome::Dropped;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return classify_close(frame.as_ref());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => return SessionOutcome::Dropped,
                },

                command = self.outbound_rx.recv() => match command {
                    Some(Command::Frame(frame)) => {
                        // ClientFrame is plain data; serialization cannot fail
                        if let Ok(json) = serde_json::to_string(&frame) {
                            if ws_sender.send(Message::Text(json)).await.is_err() {
                                return SessionOutcome::Dropped;
                            }
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        return SessionOutcome::Clean;
                    }
                },
            }
        }
    }

    /// Updates shared state from frames the server pushes
    fn observe(&mut self, frame: &ServerFrame) {
        match frame.frame_type.as_str() {
            // The welcome frame is the ready edge: the failure streak
            // ends here, not at TCP connect.
            "connected" => {
                self.connected.store(true, Ordering::SeqCst);
                self.controller.on_ready();
            }
            "online_users" => {
                let user_ids: Vec<UserId> = frame
                    .payload
                    .get("userIds")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
                    .unwrap_or_default();
                if let Ok(mut snapshot) = self.online_users.write() {
                    *snapshot = user_ids;
                }
            }
            _ => {}
        }
    }
}

/// Maps a server close frame to a retry decision
///
/// Auth close codes mean the token will keep failing, so retrying is
/// pointless. Every other close, a normal close included, counts as
/// dropped: the server going away is not a clean, user-initiated
/// disconnect.
fn classify_close(frame: Option<&CloseFrame<'_>>) -> SessionOutcome {
    match frame {
        Some(frame) => match frame.code {
            CloseCode::Library(4001) | CloseCode::Library(4003) => SessionOutcome::AuthRejected,
            _ => SessionOutcome::Dropped,
        },
        None => SessionOutcome::Dropped,
    }
}
