use std::time::Duration;

use tandem_core::liveness::{LivenessPolicy, DEFAULT_SWEEP_INTERVAL_SECS};
use tandem_db::repositories::PairingOptions;

/// Default matchmaker poll interval when no event arrives.
const DEFAULT_MATCH_FALLBACK_SECS: u64 = 15;

/// Job configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Heartbeat thresholds used by the sweeps.
    pub liveness: LivenessPolicy,
    /// Cadence shared by the three sweeps.
    pub sweep_interval: Duration,
    /// Candidate pool and seeker window for each pairing attempt.
    pub pairing: PairingOptions,
    /// How often the matchmaker drains the queue without being woken.
    pub match_fallback: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            liveness: LivenessPolicy::default(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            pairing: PairingOptions::default(),
            match_fallback: Duration::from_secs(DEFAULT_MATCH_FALLBACK_SECS),
        }
    }
}

impl JobConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default |
    /// |------------------------|---------|
    /// | `SWEEP_INTERVAL_SECS`  | `60`    |
    /// | `PENDING_TIMEOUT_SECS` | `90`    |
    /// | `LIVE_STALENESS_SECS`  | `60`    |
    /// | `WAITING_TIMEOUT_SECS` | `120`   |
    /// | `MATCH_POOL_SIZE`      | `5`     |
    /// | `MATCH_SEEKER_WINDOW`  | `5`     |
    /// | `MATCH_FALLBACK_SECS`  | `15`    |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let liveness = LivenessPolicy {
            pending_timeout_secs: env_or("PENDING_TIMEOUT_SECS", defaults.liveness.pending_timeout_secs),
            live_staleness_secs: env_or("LIVE_STALENESS_SECS", defaults.liveness.live_staleness_secs),
            waiting_timeout_secs: env_or("WAITING_TIMEOUT_SECS", defaults.liveness.waiting_timeout_secs),
        };

        let pairing = PairingOptions {
            pool_size: env_or("MATCH_POOL_SIZE", defaults.pairing.pool_size),
            seeker_window: env_or("MATCH_SEEKER_WINDOW", defaults.pairing.seeker_window),
        };

        Self {
            liveness,
            sweep_interval: Duration::from_secs(env_or(
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )),
            pairing,
            match_fallback: Duration::from_secs(env_or(
                "MATCH_FALLBACK_SECS",
                DEFAULT_MATCH_FALLBACK_SECS,
            )),
        }
    }
}

/// Parse an env var, falling back to `default` when unset.
///
/// Panics on a value that does not parse; misconfiguration should stop
/// startup.
pub fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number")),
        Err(_) => default,
    }
}
