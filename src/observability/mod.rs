//! Observability for the hub and realtime layer
//!
//! Provides:
//! - Structured logging (single-line JSON)
//! - Named lifecycle events with default severities
//! - Lock-free metrics counters
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on dispatch or delivery
//! 3. Deterministic output
//! 4. A handler failure must be reconstructible from logs alone
//!
//! # Usage
//!
//! ```ignore
//! use plexus::observability::{LifecycleEvent, Logger, MetricsRegistry};
//!
//! Logger::info("DISPATCH_COMPLETE", &[("delivered", "4")]);
//!
//! LifecycleEvent::HandlerFailed.emit(&[("subscriber", "audit")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_events_published();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::LifecycleEvent;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

#[cfg(test)]
pub use logger::capture_log;
