//! Lifecycle event bus and notification relay.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`. The matchmaker listens here for new queue
//!   entries.
//! - [`LifecycleEvent`]: the event envelope for queue, room and session
//!   transitions.
//! - [`NotificationRelay`]: best-effort forwarding of room and session
//!   events to an external webhook.

pub mod bus;
pub mod relay;

pub use bus::{event_types, EventBus, LifecycleEvent};
pub use relay::NotificationRelay;
