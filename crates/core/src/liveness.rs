//! Heartbeat-based abandonment rules used by the reconciliation sweeps.
//!
//! Heartbeats are the only liveness signal. A participant that has never
//! sent one counts as last seen when the room was created.

use chrono::Duration;

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// A pending room whose oldest participant heartbeat is older than this is
/// abandoned.
pub const DEFAULT_PENDING_TIMEOUT_SECS: i64 = 90;

/// An active room where *every* participant is silent for this long is
/// abandoned. One-sided silence is tolerated.
pub const DEFAULT_LIVE_STALENESS_SECS: i64 = 60;

/// A queue entry without a heartbeat for this long is a ghost.
pub const DEFAULT_WAITING_TIMEOUT_SECS: i64 = 120;

/// How often each sweep runs.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    pub pending_timeout_secs: i64,
    pub live_staleness_secs: i64,
    pub waiting_timeout_secs: i64,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            pending_timeout_secs: DEFAULT_PENDING_TIMEOUT_SECS,
            live_staleness_secs: DEFAULT_LIVE_STALENESS_SECS,
            waiting_timeout_secs: DEFAULT_WAITING_TIMEOUT_SECS,
        }
    }
}

impl LivenessPolicy {
    /// Queue entries whose last heartbeat is before this instant are stale.
    pub fn waiting_cutoff(&self, now: Timestamp) -> Timestamp {
        now - Duration::seconds(self.waiting_timeout_secs)
    }
}

/// Room phases the sweep distinguishes. Ended rooms are deleted and never
/// observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Pending,
    Active,
}

/// Decide whether a room has been abandoned.
///
/// - `Pending`: expired once the *oldest* last-seen time (a missing
///   heartbeat counts as `created_at`) exceeds the pending timeout.
/// - `Active`: expired only when *every* participant's last-seen time
///   exceeds the live staleness threshold.
pub fn room_expired(
    phase: RoomPhase,
    created_at: Timestamp,
    heartbeats: [Option<Timestamp>; 2],
    now: Timestamp,
    policy: &LivenessPolicy,
) -> bool {
    let last_seen = heartbeats.map(|hb| hb.unwrap_or(created_at));

    match phase {
        RoomPhase::Pending => {
            let cutoff = now - Duration::seconds(policy.pending_timeout_secs);
            last_seen.iter().any(|seen| *seen < cutoff)
        }
        RoomPhase::Active => {
            let cutoff = now - Duration::seconds(policy.live_staleness_secs);
            last_seen.iter().all(|seen| *seen < cutoff)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
