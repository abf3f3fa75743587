//! Call-session timing policy: initial deadline, extensions, hard cap.

use chrono::Duration;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a freshly started session.
pub const DEFAULT_SESSION_SECS: i64 = 300;

/// Hard cap on a session's total length, measured from `started_at`.
pub const DEFAULT_MAX_MINUTES: i32 = 30;

/// Extension increments a participant may request, in seconds.
pub const DEFAULT_EXTENSION_STEPS_SECS: [i64; 2] = [60, 300];

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Timing rules applied when a session is created or extended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    pub default_duration_secs: i64,
    pub max_minutes_cap: i32,
    /// Sorted, deduplicated, all positive.
    pub extension_steps_secs: Vec<i64>,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            default_duration_secs: DEFAULT_SESSION_SECS,
            max_minutes_cap: DEFAULT_MAX_MINUTES,
            extension_steps_secs: DEFAULT_EXTENSION_STEPS_SECS.to_vec(),
        }
    }
}

impl SessionPolicy {
    /// Deadline for a session started at `started_at`.
    ///
    /// Never past the cap, even if the default duration is configured longer.
    pub fn initial_deadline(&self, started_at: Timestamp) -> Timestamp {
        let natural = started_at + Duration::seconds(self.default_duration_secs);
        natural.min(cap_deadline(started_at, self.max_minutes_cap))
    }

    /// Whether `increment_secs` is one of the permitted extension steps.
    pub fn allows_step(&self, increment_secs: i64) -> bool {
        self.extension_steps_secs.contains(&increment_secs)
    }
}

/// The latest instant a session may ever end.
pub fn cap_deadline(started_at: Timestamp, max_minutes_cap: i32) -> Timestamp {
    started_at + Duration::minutes(i64::from(max_minutes_cap))
}

/// Compute the deadline after an extension.
///
/// The increment is added to whichever is later, the current deadline or
/// `now`, so a nearly expired session still receives the full step. The
/// result only ever moves forward and is rejected if it would cross the
/// session's cap. `max_minutes_cap` is the cap recorded on the session, not
/// the current policy default.
pub fn extend_deadline(
    policy: &SessionPolicy,
    started_at: Timestamp,
    ends_at: Timestamp,
    max_minutes_cap: i32,
    now: Timestamp,
    increment_secs: i64,
) -> Result<Timestamp, CoreError> {
    if !policy.allows_step(increment_secs) {
        return Err(CoreError::PolicyViolation(format!(
            "Extension of {increment_secs}s is not allowed; permitted steps: {:?}",
            policy.extension_steps_secs
        )));
    }

    let base = ends_at.max(now);
    let extended = base + Duration::seconds(increment_secs);
    let cap = cap_deadline(started_at, max_minutes_cap);

    if extended > cap {
        return Err(CoreError::PolicyViolation(format!(
            "Extension would exceed the {max_minutes_cap}-minute session cap"
        )));
    }
    Ok(extended)
}

/// Parse a comma-separated list of extension steps (`"60,300"`).
pub fn parse_extension_steps(raw: &str) -> Result<Vec<i64>, CoreError> {
    let mut steps = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let secs: i64 = part.parse().map_err(|_| {
            CoreError::Validation(format!("Invalid extension step \"{part}\""))
        })?;
        if secs <= 0 {
            return Err(CoreError::Validation(format!(
                "Extension step must be positive, got {secs}"
            )));
        }
        steps.push(secs);
    }
    if steps.is_empty() {
        return Err(CoreError::Validation(
            "At least one extension step is required".to_string(),
        ));
    }
    steps.sort_unstable();
    steps.dedup();
    Ok(steps)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn initial_deadline_uses_default_duration() {
        let policy = SessionPolicy::default();
        assert_eq!(
            policy.initial_deadline(t0()),
            t0() + Duration::seconds(DEFAULT_SESSION_SECS)
        );
    }

    #[test]
    fn initial_deadline_clamped_to_cap() {
        let policy = SessionPolicy {
            default_duration_secs: 3600,
            max_minutes_cap: 10,
            ..SessionPolicy::default()
        };
        assert_eq!(policy.initial_deadline(t0()), t0() + Duration::minutes(10));
    }

    #[test]
    fn extension_near_expiry_adds_to_deadline() {
        let policy = SessionPolicy::default();
        let ends_at = t0() + Duration::seconds(300);
        let now = ends_at - Duration::seconds(30);
        let extended = extend_deadline(&policy, t0(), ends_at, 30, now, 60).unwrap();
        assert_eq!(extended, ends_at + Duration::seconds(60));
    }

    #[test]
    fn extension_after_deadline_adds_to_now() {
        let policy = SessionPolicy::default();
        let ends_at = t0() + Duration::seconds(300);
        let now = ends_at + Duration::seconds(20);
        let extended = extend_deadline(&policy, t0(), ends_at, 30, now, 60).unwrap();
        assert_eq!(extended, now + Duration::seconds(60));
    }

    #[test]
    fn disallowed_step_rejected() {
        let policy = SessionPolicy::default();
        let ends_at = t0() + Duration::seconds(300);
        let err = extend_deadline(&policy, t0(), ends_at, 30, t0(), 61).unwrap_err();
        assert!(matches!(err, CoreError::PolicyViolation(_)));
    }

    #[test]
    fn extension_past_cap_rejected() {
        let policy = SessionPolicy::default();
        let ends_at = t0() + Duration::minutes(28);
        let err = extend_deadline(&policy, t0(), ends_at, 30, t0(), 300).unwrap_err();
        assert!(matches!(err, CoreError::PolicyViolation(_)));
    }

    #[test]
    fn extension_landing_exactly_on_cap_accepted() {
        let policy = SessionPolicy::default();
        let ends_at = t0() + Duration::minutes(29);
        let extended = extend_deadline(&policy, t0(), ends_at, 30, t0(), 60).unwrap();
        assert_eq!(extended, cap_deadline(t0(), 30));
    }

    #[test]
    fn parse_steps_sorts_and_dedups() {
        assert_eq!(parse_extension_steps("300, 60,60").unwrap(), vec![60, 300]);
    }

    #[test]
    fn parse_steps_rejects_bad_input() {
        assert!(parse_extension_steps("").is_err());
        assert!(parse_extension_steps("abc").is_err());
        assert!(parse_extension_steps("0").is_err());
    }
}
