//! Canonical event envelope
//!
//! Every cross-domain fact flows through the hub as one `Event`. Types are
//! dot-namespaced `<domain>.<entity>.<action>` strings; the hub treats them
//! as opaque except for subscription matching and the domain segment used
//! by the category catalog. Payloads stay opaque JSON: producing and
//! consuming domains agree on shapes, the hub does not.
//!
//! Envelopes are immutable once published. The hub stores and hands out
//! `Arc<Event>`; the builder methods below exist only before publish.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{PublishError, PublishResult};

/// Dispatch priority carried on each event
///
/// Dispatch within one publish is immediate, so priority does not reorder
/// handlers here; it is defined (and ordered) for consumers that queue
/// events downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// A single event flowing through the hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Collision-resistant id, `<unix_millis>-<random hex>`
    pub id: String,
    /// Publish wall-clock time
    pub timestamp: DateTime<Utc>,
    /// Publishing domain or component
    pub source: String,
    /// Dot-namespaced type, `<domain>.<entity>.<action>`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Opaque payload
    pub data: Value,
    /// Dispatch priority
    #[serde(default)]
    pub priority: Priority,
    /// Whether handlers may publish derived events in response
    #[serde(default = "default_propagate")]
    pub propagate: bool,
    /// Causal chain depth, 0 for fresh events
    #[serde(default)]
    pub propagation_depth: u32,
}

fn default_propagate() -> bool {
    true
}

impl Event {
    /// Create a fresh event: generated id, current timestamp, normal
    /// priority, propagation allowed, depth 0
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id: generate_event_id(),
            timestamp: Utc::now(),
            source: source.into(),
            event_type: event_type.into(),
            data,
            priority: Priority::Normal,
            propagate: true,
            propagation_depth: 0,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Allow or forbid derived publishes in response to this event
    pub fn with_propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }

    /// Validate the envelope at the publish boundary
    ///
    /// Whitespace-only strings count as empty.
    pub fn validate(&self) -> PublishResult<()> {
        if self.event_type.trim().is_empty() {
            return Err(PublishError::invalid("event type must not be empty"));
        }
        if self.source.trim().is_empty() {
            return Err(PublishError::invalid("event source must not be empty"));
        }
        Ok(())
    }

    /// The domain segment of the type (everything before the first dot)
    pub fn domain(&self) -> &str {
        self.event_type
            .split_once('.')
            .map(|(domain, _)| domain)
            .unwrap_or(&self.event_type)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] from {} (priority={}, depth={})",
            self.event_type,
            self.id,
            self.source,
            self.priority.as_str(),
            self.propagation_depth
        )
    }
}

/// Generate a collision-resistant event id
///
/// Millisecond timestamp plus 48 random bits, so ids also sort roughly by
/// publish time.
pub fn generate_event_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u64 = rand::thread_rng().gen_range(0..(1u64 << 48));
    format!("{}-{:012x}", millis, suffix)
}
