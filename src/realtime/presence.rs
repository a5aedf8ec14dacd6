//! User presence tracking
//!
//! Presence is keyed by user, not by socket: a user with three devices is
//! one online user. The online edge fires when the first connection
//! registers and the offline edge exactly when the last one closes.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use super::errors::{RealtimeError, RealtimeResult};
use super::UserId;

/// Server-wide mapping from user to live connection ids
#[derive(Debug, Default)]
pub struct PresenceSet {
    connections: RwLock<BTreeMap<UserId, HashSet<String>>>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user
    ///
    /// Returns true when this brought the user online (first connection).
    pub fn connect(&self, user_id: UserId, connection_id: &str) -> RealtimeResult<bool> {
        let mut connections = self
            .connections
            .write()
            .map_err(|_| RealtimeError::Internal("Lock poisoned".into()))?;

        let entry = connections.entry(user_id).or_default();
        let first = entry.is_empty();
        entry.insert(connection_id.to_string());
        Ok(first)
    }

    /// Deregister a connection for a user
    ///
    /// Returns true when this took the user offline (last connection).
    /// Unknown connections are a no-op returning false, so double
    /// disconnects cannot produce a second offline edge.
    pub fn disconnect(&self, user_id: UserId, connection_id: &str) -> RealtimeResult<bool> {
        let mut connections = self
            .connections
            .write()
            .map_err(|_| RealtimeError::Internal("Lock poisoned".into()))?;

        let Some(entry) = connections.get_mut(&user_id) else {
            return Ok(false);
        };

        if !entry.remove(connection_id) {
            return Ok(false);
        }
        if entry.is_empty() {
            connections.remove(&user_id);
            return Ok(true);
        }
        Ok(false)
    }

    /// Whether a user has at least one live connection
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.connections
            .read()
            .map(|connections| connections.contains_key(&user_id))
            .unwrap_or(false)
    }

    /// All online users, ascending
    pub fn online_users(&self) -> Vec<UserId> {
        self.connections
            .read()
            .map(|connections| connections.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Connection ids for one user, for targeted fan-out
    pub fn connections_for(&self, user_id: UserId) -> Vec<String> {
        self.connections
            .read()
            .map(|connections| {
                connections
                    .get(&user_id)
                    .map(|entry| entry.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Number of online users
    pub fn online_count(&self) -> usize {
        self.connections
            .read()
            .map(|connections| connections.len())
            .unwrap_or(0)
    }

    /// Total live connections across all users
    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .map(|connections| connections.values().map(HashSet::len).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_connection_brings_user_online() {
        let presence = PresenceSet::new();

        assert!(presence.connect(42, "conn-1").unwrap());
        assert!(presence.is_online(42));

        // Second device is not a new online edge
        assert!(!presence.connect(42, "conn-2").unwrap());
        assert_eq!(presence.connection_count(), 2);
        assert_eq!(presence.online_count(), 1);
    }

    #[test]
    fn test_last_disconnect_takes_user_offline() {
        let presence = PresenceSet::new();
        presence.connect(42, "conn-1").unwrap();
        presence.connect(42, "conn-2").unwrap();

        // Closing one device keeps the user online
        assert!(!presence.disconnect(42, "conn-1").unwrap());
        assert!(presence.is_online(42));

        // Closing the last one is the single offline edge
        assert!(presence.disconnect(42, "conn-2").unwrap());
        assert!(!presence.is_online(42));
    }

    #[test]
    fn test_double_disconnect_is_noop() {
        let presence = PresenceSet::new();
        presence.connect(42, "conn-1").unwrap();

        assert!(presence.disconnect(42, "conn-1").unwrap());
        assert!(!presence.disconnect(42, "conn-1").unwrap());
        assert!(!presence.disconnect(99, "conn-x").unwrap());
    }

    #[test]
    fn test_online_users_sorted() {
        let presence = PresenceSet::new();
        presence.connect(42, "a").unwrap();
        presence.connect(3, "b").unwrap();
        presence.connect(7, "c").unwrap();

        assert_eq!(presence.online_users(), vec![3, 7, 42]);
    }

    #[test]
    fn test_connections_for_user() {
        let presence = PresenceSet::new();
        presence.connect(42, "conn-1").unwrap();
        presence.connect(42, "conn-2").unwrap();
        presence.connect(7, "conn-3").unwrap();

        let mut conns = presence.connections_for(42);
        conns.sort();
        assert_eq!(conns, vec!["conn-1", "conn-2"]);
        assert!(presence.connections_for(99).is_empty());
    }
}
