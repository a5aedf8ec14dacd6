//! Bounded in-memory event history
//!
//! Every accepted publish is recorded here before fan-out. The buffer keeps
//! the most recent `capacity` events in publish order (oldest first) and
//! evicts from the front; it is diagnostics state, not durable storage.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use super::event::Event;

/// Ring buffer of the most recent events
pub struct EventHistory {
    capacity: usize,
    events: RwLock<VecDeque<Arc<Event>>>,
}

impl EventHistory {
    /// Create a history buffer with the given capacity
    ///
    /// A zero capacity is clamped to 1 so the most recent event is always
    /// inspectable.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record an accepted event, evicting the oldest beyond capacity
    pub fn append(&self, event: Arc<Event>) {
        let Ok(mut events) = self.events.write() else {
            return;
        };
        events.push_back(event);
        while events.len() > self.capacity {
            events.pop_front();
        }
    }

    /// Snapshot of all buffered events, oldest first
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.events
            .read()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot filtered by exact type and/or source, oldest first
    pub fn filtered(&self, event_type: Option<&str>, source: Option<&str>) -> Vec<Arc<Event>> {
        self.events
            .read()
            .map(|events| {
                events
                    .iter()
                    .filter(|event| {
                        event_type.map_or(true, |t| event.event_type == t)
                            && source.map_or(true, |s| event.source == s)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Count buffered events per domain segment
    pub fn domain_counts(&self) -> std::collections::HashMap<String, usize> {
        let mut counts = std::collections::HashMap::new();
        if let Ok(events) = self.events.read() {
            for event in events.iter() {
                *counts.entry(event.domain().to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or(0)
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
