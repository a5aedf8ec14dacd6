//! Metrics registry for the hub and realtime layer
//!
//! Conventions:
//! - Counters are monotonic, reset only on process start
//! - The two live-population values (subscriptions, online users) move both
//!   ways
//! - Thread-safe but lock-free

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics registry containing all operational counters
///
/// # Thread Safety
///
/// All counters use atomic operations for thread-safe increments.
/// Uses Relaxed ordering for minimal overhead (eventual consistency is fine
/// for metrics).
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Events accepted and dispatched
    events_published: AtomicU64,
    /// Events rejected at the publish boundary
    events_rejected: AtomicU64,
    /// Handler invocations across all dispatches
    handlers_invoked: AtomicU64,
    /// Handler errors and panics captured during fan-out
    handler_failures: AtomicU64,
    /// Derived publishes rejected (depth ceiling or propagate=false)
    propagation_rejections: AtomicU64,
    /// Live subscription count
    subscriptions_active: AtomicU64,
    /// WebSocket connections accepted
    connections_opened: AtomicU64,
    /// WebSocket connections fully closed
    connections_closed: AtomicU64,
    /// Handshakes rejected for bad or missing tokens
    auth_failures: AtomicU64,
    /// Inbound frames parsed
    frames_in: AtomicU64,
    /// Outbound frames written
    frames_out: AtomicU64,
    /// Frames discarded: malformed inbound, or outbound to a full queue
    frames_dropped: AtomicU64,
    /// Users currently online (presence set size)
    users_online: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Hub metrics

    /// Increment events published
    pub fn increment_events_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment events rejected
    pub fn increment_events_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Add handler invocations from one dispatch
    pub fn add_handlers_invoked(&self, count: u64) {
        self.handlers_invoked.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment handler failures
    pub fn increment_handler_failures(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment propagation rejections
    pub fn increment_propagation_rejections(&self) {
        self.propagation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment live subscriptions
    pub fn increment_subscriptions(&self) {
        self.subscriptions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement live subscriptions
    pub fn decrement_subscriptions(&self) {
        self.subscriptions_active.fetch_sub(1, Ordering::Relaxed);
    }

    // Realtime metrics

    /// Increment connections opened
    pub fn increment_connections_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment connections closed
    pub fn increment_connections_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment auth failures
    pub fn increment_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment inbound frames
    pub fn increment_frames_in(&self) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment outbound frames
    pub fn increment_frames_out(&self) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment dropped frames
    pub fn increment_frames_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the online user count (presence set size)
    pub fn set_users_online(&self, count: u64) {
        self.users_online.store(count, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        format!(
            r#"{{"events_published":{},"events_rejected":{},"handlers_invoked":{},"handler_failures":{},"propagation_rejections":{},"subscriptions_active":{},"connections_opened":{},"connections_closed":{},"auth_failures":{},"frames_in":{},"frames_out":{},"frames_dropped":{},"users_online":{}}}"#,
            self.events_published.load(Ordering::Relaxed),
            self.events_rejected.load(Ordering::Relaxed),
            self.handlers_invoked.load(Ordering::Relaxed),
            self.handler_failures.load(Ordering::Relaxed),
            self.propagation_rejections.load(Ordering::Relaxed),
            self.subscriptions_active.load(Ordering::Relaxed),
            self.connections_opened.load(Ordering::Relaxed),
            self.connections_closed.load(Ordering::Relaxed),
            self.auth_failures.load(Ordering::Relaxed),
            self.frames_in.load(Ordering::Relaxed),
            self.frames_out.load(Ordering::Relaxed),
            self.frames_dropped.load(Ordering::Relaxed),
            self.users_online.load(Ordering::Relaxed),
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            handlers_invoked: self.handlers_invoked.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            propagation_rejections: self.propagation_rejections.load(Ordering::Relaxed),
            subscriptions_active: self.subscriptions_active.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            users_online: self.users_online.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub events_rejected: u64,
    pub handlers_invoked: u64,
    pub handler_failures: u64,
    pub propagation_rejections: u64,
    pub subscriptions_active: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub auth_failures: u64,
    pub frames_in: u64,
    pub frames_out: u64,
    pub frames_dropped: u64,
    pub users_online: u64,
}
