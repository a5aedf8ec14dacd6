//! Subscription registry with pattern matching
//!
//! Patterns come in three forms, from most to least specific:
//! exact (`social.post.created`), trailing wildcard (`social.*`, any prefix
//! depth), and global (`*`). Matching returns subscriptions ordered
//! most-specific-first: exact, then prefixes by descending length, then
//! global; ties break by registration order, so the handler sequence for a
//! given publish is deterministic.
//!
//! Unsubscribing is idempotent and duplicate subscriptions are allowed:
//! the same subscriber registering the same pattern twice fires twice.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::errors::HandlerError;
use super::event::Event;
use super::Propagation;

/// A parsed subscription pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Full-string equality
    Exact(String),
    /// Trailing wildcard, stored as the prefix including the final dot
    Prefix(String),
    /// Matches every type
    All,
}

impl Pattern {
    /// Parse a pattern string
    ///
    /// `*` is global, `domain.*` (any depth) is a prefix, anything else is
    /// exact. There is no mid-string wildcard grammar; a `*` elsewhere is
    /// matched literally.
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            return Pattern::All;
        }
        if let Some(prefix) = pattern.strip_suffix(".*") {
            return Pattern::Prefix(format!("{}.", prefix));
        }
        Pattern::Exact(pattern.to_string())
    }

    /// Whether the pattern matches an event type
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Pattern::Exact(exact) => exact == event_type,
            Pattern::Prefix(prefix) => event_type.starts_with(prefix.as_str()),
            Pattern::All => true,
        }
    }

    /// Specificity class: 0 exact, 1 prefix, 2 global
    fn class(&self) -> u8 {
        match self {
            Pattern::Exact(_) => 0,
            Pattern::Prefix(_) => 1,
            Pattern::All => 2,
        }
    }

    /// Prefix length used to order wildcard patterns (longer first)
    fn prefix_len(&self) -> usize {
        match self {
            Pattern::Exact(exact) => exact.len(),
            Pattern::Prefix(prefix) => prefix.len(),
            Pattern::All => 0,
        }
    }

    /// The domain segment the pattern is anchored to, None for global
    pub fn domain(&self) -> Option<&str> {
        match self {
            Pattern::Exact(exact) => Some(exact.split('.').next().unwrap_or(exact)),
            Pattern::Prefix(prefix) => Some(prefix.split('.').next().unwrap_or(prefix)),
            Pattern::All => None,
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::Exact(exact) => write!(f, "{}", exact),
            Pattern::Prefix(prefix) => write!(f, "{}*", prefix),
            Pattern::All => write!(f, "*"),
        }
    }
}

/// Opaque handle identifying one subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying id
    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A synchronous handler invoked inline during publish
pub(crate) type SyncHandler =
    dyn Fn(&Event, &Propagation<'_>) -> Result<(), HandlerError> + Send + Sync;

/// Where a matched event gets delivered
#[derive(Clone)]
pub(crate) enum HandlerSlot {
    /// Runs inline; errors and panics are captured per handler
    Sync(Arc<SyncHandler>),
    /// Fire-and-forget send into a consumer-owned channel
    Channel(mpsc::UnboundedSender<Arc<Event>>),
}

struct SubscriptionEntry {
    pattern: Pattern,
    subscriber_id: String,
    slot: HandlerSlot,
    /// Registration sequence, the deterministic tie-break
    seq: u64,
}

/// A subscription matched for one event type, in dispatch order
pub(crate) struct Matched {
    pub handle: SubscriptionHandle,
    pub subscriber_id: String,
    pub slot: HandlerSlot,
}

/// Pattern-indexed subscription store
///
/// Internally synchronized; matching snapshots entries so no lock is held
/// while handlers run.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<Uuid, SubscriptionEntry>>,
    by_subscriber: RwLock<HashMap<String, HashSet<Uuid>>>,
    next_seq: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription, returning its handle
    pub(crate) fn subscribe_slot(
        &self,
        pattern: &str,
        subscriber_id: &str,
        slot: HandlerSlot,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle::generate();
        let entry = SubscriptionEntry {
            pattern: Pattern::parse(pattern),
            subscriber_id: subscriber_id.to_string(),
            slot,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(mut entries) = self.entries.write() {
            entries.insert(handle.id(), entry);
        }
        if let Ok(mut index) = self.by_subscriber.write() {
            index
                .entry(subscriber_id.to_string())
                .or_default()
                .insert(handle.id());
        }

        handle
    }

    /// Remove a subscription
    ///
    /// Idempotent: a handle that was already removed (or never existed) is
    /// a no-op. Returns whether anything was removed by this call.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = match self.entries.write() {
            Ok(mut entries) => entries.remove(&handle.id()),
            Err(_) => None,
        };

        let Some(entry) = removed else {
            return false;
        };

        if let Ok(mut index) = self.by_subscriber.write() {
            if let Some(handles) = index.get_mut(&entry.subscriber_id) {
                handles.remove(&handle.id());
                if handles.is_empty() {
                    index.remove(&entry.subscriber_id);
                }
            }
        }
        true
    }

    /// Remove every subscription registered under a subscriber id
    ///
    /// Returns the number removed.
    pub fn unsubscribe_all(&self, subscriber_id: &str) -> usize {
        let handles: Vec<Uuid> = match self.by_subscriber.write() {
            Ok(mut index) => index
                .remove(subscriber_id)
                .map(|set| set.into_iter().collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        if handles.is_empty() {
            return 0;
        }

        let mut removed = 0;
        if let Ok(mut entries) = self.entries.write() {
            for id in &handles {
                if entries.remove(id).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Snapshot the subscriptions matching an event type, dispatch-ordered
    pub(crate) fn matching(&self, event_type: &str) -> Vec<Matched> {
        let Ok(entries) = self.entries.read() else {
            return Vec::new();
        };

        let mut matched: Vec<(&Uuid, &SubscriptionEntry)> = entries
            .iter()
            .filter(|(_, entry)| entry.pattern.matches(event_type))
            .collect();

        // Most specific first; insertion order breaks ties
        matched.sort_by(|(_, a), (_, b)| {
            a.pattern
                .class()
                .cmp(&b.pattern.class())
                .then(b.pattern.prefix_len().cmp(&a.pattern.prefix_len()))
                .then(a.seq.cmp(&b.seq))
        });

        matched
            .into_iter()
            .map(|(id, entry)| Matched {
                handle: SubscriptionHandle(*id),
                subscriber_id: entry.subscriber_id.clone(),
                slot: entry.slot.clone(),
            })
            .collect()
    }

    /// Count live subscriptions per pattern domain
    ///
    /// Global subscriptions have no domain and are keyed under `*`.
    pub fn domain_counts(&self) -> HashMap<String, usize> {
        let Ok(entries) = self.entries.read() else {
            return HashMap::new();
        };

        let mut counts: HashMap<String, usize> = HashMap::new();
        for entry in entries.values() {
            let key = entry.pattern.domain().unwrap_or("*").to_string();
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
