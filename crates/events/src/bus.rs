//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`LifecycleEvent`]s. It is
//! shared via `Arc<EventBus>` between the HTTP handlers, the matchmaker and
//! the sweeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_core::types::DbId;
use tokio::sync::broadcast;

/// Event type names carried on the bus.
pub mod event_types {
    /// A queue entry was created or moved back into `waiting`.
    pub const QUEUE_ENTRY_WAITING: &str = "queue.entry_waiting";
    /// The Pairing Transaction created a pending room.
    pub const ROOM_CREATED: &str = "room.created";
    /// The first member entered and the call session started.
    pub const ROOM_ACTIVATED: &str = "room.activated";
    /// A call session deadline was pushed back.
    pub const SESSION_EXTENDED: &str = "session.extended";
    /// A room was torn down, for any reason.
    pub const ROOM_ENDED: &str = "room.ended";
}

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// A queue, room or session transition.
///
/// Constructed via [`LifecycleEvent::new`] and enriched with the builder
/// methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Dot-separated event name, one of [`event_types`].
    pub event_type: String,

    /// Room the event concerns, if any.
    pub room_id: Option<DbId>,

    /// Participants affected by the event.
    pub participant_ids: Vec<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            room_id: None,
            participant_ids: Vec::new(),
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_room(mut self, room_id: DbId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_participants(mut self, ids: impl IntoIterator<Item = DbId>) -> Self {
        self.participant_ids = ids.into_iter().collect();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// `queue.entry_waiting` for one participant.
    pub fn entry_waiting(participant_id: DbId) -> Self {
        Self::new(event_types::QUEUE_ENTRY_WAITING).with_participants([participant_id])
    }

    /// `room.ended` with the teardown reason in the payload.
    pub fn room_ended(room_id: DbId, members: [DbId; 2], reason: &str) -> Self {
        Self::new(event_types::ROOM_ENDED)
            .with_room(room_id)
            .with_participants(members)
            .with_payload(serde_json::json!({ "reason": reason }))
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use tandem_events::bus::{EventBus, LifecycleEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(LifecycleEvent::entry_waiting(42));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no active subscribers the event is dropped.
    pub fn publish(&self, event: LifecycleEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(LifecycleEvent::room_ended(9, [1, 2], "expired"));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, event_types::ROOM_ENDED);
        assert_eq!(received.room_id, Some(9));
        assert_eq!(received.participant_ids, vec![1, 2]);
        assert_eq!(received.payload["reason"], "expired");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(LifecycleEvent::entry_waiting(5));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event_type, event_types::QUEUE_ENTRY_WAITING);
        assert_eq!(e2.participant_ids, vec![5]);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(LifecycleEvent::new(event_types::ROOM_CREATED));
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for id in 0..5 {
            bus.publish(LifecycleEvent::entry_waiting(id));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn bare_event_has_empty_optional_fields() {
        let event = LifecycleEvent::new("bare.event");
        assert!(event.room_id.is_none());
        assert!(event.participant_ids.is_empty());
        assert!(event.payload.is_object());
    }
}
