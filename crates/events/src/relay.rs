//! Best-effort webhook relay for room and session events.
//!
//! [`NotificationRelay`] subscribes to the bus and POSTs each `room.*` and
//! `session.*` event as JSON to a configured URL. Every delivery runs in its
//! own task with a short retry schedule; failures are logged and dropped.
//! Nothing in the pairing or session state depends on delivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::bus::LifecycleEvent;

/// Retry delays in seconds between delivery attempts.
const RETRY_DELAYS_SECS: [u64; 2] = [1, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Event type prefixes forwarded to the webhook.
const RELAYED_PREFIXES: [&str; 2] = ["room.", "session."];

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The underlying HTTP request failed (network, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// NotificationRelay
// ---------------------------------------------------------------------------

/// Forwards lifecycle events to an external webhook.
pub struct NotificationRelay {
    client: reqwest::Client,
    url: String,
}

impl NotificationRelay {
    pub fn new(url: impl Into<String>) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Whether an event type is forwarded.
    pub fn is_relayed(event_type: &str) -> bool {
        RELAYED_PREFIXES.iter().any(|p| event_type.starts_with(p))
    }

    /// Run the relay loop until the bus closes.
    ///
    /// Deliveries are spawned, so a slow webhook never makes the loop lag.
    pub async fn run(self, mut receiver: broadcast::Receiver<LifecycleEvent>) {
        let relay = Arc::new(self);
        tracing::info!(url = %relay.url, "Notification relay started");
        loop {
            match receiver.recv().await {
                Ok(event) if Self::is_relayed(&event.event_type) => {
                    let relay = Arc::clone(&relay);
                    tokio::spawn(async move {
                        // Errors are already logged inside deliver.
                        let _ = relay.deliver(&event).await;
                    });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification relay lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification relay shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event, retrying on failure.
    pub async fn deliver(&self, event: &LifecycleEvent) -> Result<(), RelayError> {
        let payload = Self::payload(event);

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(
                        attempt = attempt + 1,
                        event_type = %event.event_type,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        self.try_send(&payload).await.inspect_err(|e| {
            tracing::warn!(
                event_type = %event.event_type,
                room_id = ?event.room_id,
                error = %e,
                "Webhook delivery failed, event dropped"
            );
        })
    }

    fn payload(event: &LifecycleEvent) -> serde_json::Value {
        serde_json::json!({
            "event_type": event.event_type,
            "room_id": event.room_id,
            "participant_ids": event.participant_ids,
            "payload": event.payload,
            "timestamp": event.timestamp,
        })
    }

    async fn try_send(&self, payload: &serde_json::Value) -> Result<(), RelayError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(RelayError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
