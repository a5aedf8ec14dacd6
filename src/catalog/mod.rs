//! Metadata catalog of platform domains
//!
//! Every event type starts with a domain segment (`social.post.created` is
//! owned by `social`). The catalog maps those domain identifiers to
//! descriptive metadata so cross-domain tooling can label and group events
//! without hardcoding the platform's feature list.
//!
//! The catalog is append-only: registered entries are never replaced or
//! removed. It has no behavior beyond lookup.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Descriptive metadata for one platform domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Domain identifier, the first segment of event types
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// One-line description
    pub description: String,
}

impl Category {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Append-only registry of platform domains
///
/// Sorted by id so listings are deterministic.
#[derive(Debug, Default)]
pub struct CategoryCatalog {
    entries: RwLock<BTreeMap<String, Category>>,
}

impl CategoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog pre-populated with the platform's domains
    pub fn builtin() -> Self {
        let catalog = Self::new();

        let builtin = [
            ("ai", "AI", "Model serving, assistants, and inference"),
            ("analytics", "Analytics", "Usage metrics and reporting"),
            ("blockchain", "Blockchain", "Wallets, contracts, and on-chain activity"),
            ("chat", "Chat", "Direct messages, typing, and read receipts"),
            ("communication", "Communication", "Calls, mail, and announcements"),
            ("cryptography", "Cryptography", "Key management and signing"),
            ("ecommerce", "E-Commerce", "Catalog, carts, and orders"),
            ("elearning", "E-Learning", "Courses, lessons, and progress"),
            ("gaming", "Gaming", "Matches, scores, and achievements"),
            ("health", "Health", "Wellness tracking and reminders"),
            ("hub", "Hub", "Internal hub diagnostics"),
            ("iot", "IoT", "Device telemetry and control"),
            ("neuromorphic", "Neuromorphic", "Spiking-network experiments"),
            ("notification", "Notification", "Targeted user notifications"),
            ("presence", "Presence", "User online and offline transitions"),
            ("quantum", "Quantum", "Quantum computing simulations"),
            ("robotics", "Robotics", "Robot fleets and task execution"),
            ("social", "Social", "Posts, follows, and reactions"),
            ("trading", "Trading", "Markets, orders, and portfolios"),
        ];

        for (id, name, description) in builtin {
            catalog.register(Category::new(id, name, description));
        }

        catalog
    }

    /// Register a new domain
    ///
    /// Returns false (and leaves the existing entry untouched) if the id is
    /// already registered.
    pub fn register(&self, category: Category) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };
        if entries.contains_key(&category.id) {
            return false;
        }
        entries.insert(category.id.clone(), category);
        true
    }

    /// Look up a domain by id
    pub fn get(&self, id: &str) -> Option<Category> {
        self.entries.read().ok()?.get(id).cloned()
    }

    /// Whether the id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(id))
            .unwrap_or(false)
    }

    /// Resolve the category owning an event type's domain segment
    pub fn category_of(&self, event_type: &str) -> Option<Category> {
        let domain = event_type.split('.').next()?;
        self.get(domain)
    }

    /// All registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All entries, sorted by id
    pub fn all(&self) -> Vec<Category> {
        self.entries
            .read()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registered domains
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
