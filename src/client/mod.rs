//! Reconnecting WebSocket client
//!
//! Embeddable counterpart to the realtime server: connects with a token,
//! resubmits itself after unexpected closes with exponential backoff, and
//! keeps a live online-users snapshot from `online_users` frames.
//!
//! Retry timing lives in [`ReconnectPolicy`]; the decision logic is the
//! [`ReconnectController`] state machine, which never touches a clock and
//! is tested without one.

pub mod controller;
pub mod policy;
pub mod socket;

pub use controller::{NextStep, ReconnectController, ReconnectState};
pub use policy::ReconnectPolicy;
pub use socket::{ClientConfig, RealtimeClient};
