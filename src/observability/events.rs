//! Observable lifecycle events
//!
//! Every externally visible state change in the hub and the realtime layer
//! logs one of these named events. Names are stable strings; dashboards and
//! log filters key on them.

use std::fmt;

use super::logger::{Logger, Severity};

/// Observable lifecycle events
///
/// Covers:
/// - Boot & shutdown
/// - Hub dispatch outcomes
/// - Subscription registry changes
/// - Realtime sessions and presence
/// - Client reconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    // Boot & lifecycle
    /// Startup begins
    BootStart,
    /// Startup complete, ready to serve
    BootComplete,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,
    /// Configuration loaded from file
    ConfigLoaded,
    /// Configuration file absent, defaults in effect
    ConfigDefaulted,

    // Hub dispatch
    /// Event accepted and recorded
    EventPublished,
    /// Event rejected before dispatch
    EventRejected,
    /// A handler returned an error during fan-out
    HandlerFailed,
    /// A handler panicked during fan-out
    HandlerPanicked,
    /// Derived event exceeded the propagation depth ceiling
    PropagationLimit,
    /// Derived publish attempted from a propagate=false cause
    PropagationDenied,

    // Subscription registry
    /// Subscription registered
    SubscriptionAdded,
    /// Subscription removed
    SubscriptionRemoved,
    /// Dead channel subscription pruned during dispatch
    SubscriptionPruned,

    // Realtime sessions
    /// WebSocket listener bound
    RealtimeListening,
    /// TCP accept failed before any session existed
    AcceptFailed,
    /// Connection accepted, handshake complete
    ConnectionOpen,
    /// Token verified, session ready
    ConnectionReady,
    /// Token missing or rejected
    AuthFailed,
    /// Connection fully closed
    ConnectionClosed,
    /// Frame discarded: malformed inbound, or outbound to a full queue
    FrameDropped,
    /// Idle connection failed to answer a ping in time
    HeartbeatTimeout,
    /// User's first connection came online
    PresenceOnline,
    /// User's last connection went offline
    PresenceOffline,
    /// Outbound forward to a socket failed
    ForwardFailed,

    // Reconnection client
    /// Retry scheduled after an unexpected close
    ReconnectScheduled,
    /// Retry budget exhausted
    ReconnectGaveUp,

    // HTTP introspection
    /// HTTP listener bound
    HttpListening,
}

impl LifecycleEvent {
    /// Returns the stable string name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::BootStart => "PLEXUS_STARTUP_BEGIN",
            LifecycleEvent::BootComplete => "PLEXUS_STARTUP_COMPLETE",
            LifecycleEvent::ShutdownStart => "SHUTDOWN_START",
            LifecycleEvent::ShutdownComplete => "SHUTDOWN_COMPLETE",
            LifecycleEvent::ConfigLoaded => "CONFIG_LOADED",
            LifecycleEvent::ConfigDefaulted => "CONFIG_DEFAULTED",

            LifecycleEvent::EventPublished => "EVENT_PUBLISHED",
            LifecycleEvent::EventRejected => "EVENT_REJECTED",
            LifecycleEvent::HandlerFailed => "HANDLER_FAILED",
            LifecycleEvent::HandlerPanicked => "HANDLER_PANICKED",
            LifecycleEvent::PropagationLimit => "PROPAGATION_LIMIT_EXCEEDED",
            LifecycleEvent::PropagationDenied => "PROPAGATION_DISABLED",

            LifecycleEvent::SubscriptionAdded => "SUBSCRIPTION_ADDED",
            LifecycleEvent::SubscriptionRemoved => "SUBSCRIPTION_REMOVED",
            LifecycleEvent::SubscriptionPruned => "SUBSCRIPTION_PRUNED",

            LifecycleEvent::RealtimeListening => "REALTIME_LISTENING",
            LifecycleEvent::AcceptFailed => "ACCEPT_FAILED",
            LifecycleEvent::ConnectionOpen => "CONNECTION_OPEN",
            LifecycleEvent::ConnectionReady => "CONNECTION_READY",
            LifecycleEvent::AuthFailed => "AUTH_FAILED",
            LifecycleEvent::ConnectionClosed => "CONNECTION_CLOSED",
            LifecycleEvent::FrameDropped => "FRAME_DROPPED",
            LifecycleEvent::HeartbeatTimeout => "HEARTBEAT_TIMEOUT",
            LifecycleEvent::PresenceOnline => "PRESENCE_ONLINE",
            LifecycleEvent::PresenceOffline => "PRESENCE_OFFLINE",
            LifecycleEvent::ForwardFailed => "FORWARD_FAILED",

            LifecycleEvent::ReconnectScheduled => "RECONNECT_SCHEDULED",
            LifecycleEvent::ReconnectGaveUp => "RECONNECT_GAVE_UP",

            LifecycleEvent::HttpListening => "HTTP_LISTENING",
        }
    }

    /// Default severity this event logs at
    pub fn severity(&self) -> Severity {
        match self {
            LifecycleEvent::EventPublished => Severity::Trace,

            LifecycleEvent::EventRejected
            | LifecycleEvent::AuthFailed
            | LifecycleEvent::FrameDropped
            | LifecycleEvent::HeartbeatTimeout
            | LifecycleEvent::PropagationDenied
            | LifecycleEvent::SubscriptionPruned
            | LifecycleEvent::ReconnectScheduled => Severity::Warn,

            LifecycleEvent::HandlerFailed
            | LifecycleEvent::HandlerPanicked
            | LifecycleEvent::PropagationLimit
            | LifecycleEvent::ForwardFailed
            | LifecycleEvent::AcceptFailed
            | LifecycleEvent::ReconnectGaveUp => Severity::Error,

            _ => Severity::Info,
        }
    }

    /// Log this event with its default severity
    pub fn emit(&self, fields: &[(&str, &str)]) {
        match self.severity() {
            Severity::Error => Logger::error(self.as_str(), fields),
            Severity::Fatal => Logger::fatal(self.as_str(), fields),
            severity => Logger::log(severity, self.as_str(), fields),
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
