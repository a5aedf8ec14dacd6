//! Realtime delivery layer
//!
//! WebSocket sessions on top of the event hub: clients authenticate during
//! the handshake, push chat frames that republish as hub events, and
//! receive hub events addressed to them plus presence updates.
//!
//! # Architecture
//!
//! - **Session**: per-connection lifecycle state machine
//! - **Auth**: handshake token verification
//! - **Presence**: user to live-connection mapping
//! - **Protocol**: client/server frame types
//! - **Server**: accept loop, per-connection tasks, hub forwarder
//!
//! The server owns all sessions and the presence set; the hub is only
//! reached through `publish` and channel subscriptions.

pub mod auth;
pub mod errors;
pub mod presence;
pub mod protocol;
pub mod server;
pub mod session;

pub use auth::{JwtVerifier, SessionClaims, StaticTokenVerifier, TokenVerifier};
pub use errors::{RealtimeError, RealtimeResult};
pub use presence::PresenceSet;
pub use protocol::{ClientFrame, ServerFrame};
pub use server::{RealtimeConfig, RealtimeServer};
pub use session::{Session, SessionState};

/// Authenticated principal bound to a session
pub type UserId = u64;
