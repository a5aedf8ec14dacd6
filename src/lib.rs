//! plexus - a cross-domain event hub with real-time delivery
//!
//! The hub is the integration point for a platform of loosely coupled
//! feature domains: every domain publishes envelope events and subscribes
//! to the types it cares about, with wildcard patterns, bounded history,
//! and hard propagation limits so one misbehaving handler cannot cascade
//! through the rest. The realtime layer carries hub events to and from
//! live WebSocket clients with token auth, presence tracking, and
//! reconnecting client support.

pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod http;
pub mod hub;
pub mod observability;
pub mod realtime;

pub use catalog::{Category, CategoryCatalog};
pub use config::Config;
pub use hub::{Event, EventHub, HubConfig, Priority, SubscriptionHandle};
pub use realtime::{RealtimeConfig, RealtimeServer};
