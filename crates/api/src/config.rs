use tandem_core::session::{
    parse_extension_steps, SessionPolicy, DEFAULT_MAX_MINUTES, DEFAULT_SESSION_SECS,
};
use tandem_worker::config::env_or;
use tandem_worker::JobConfig;

use crate::auth::jwt::JwtConfig;
use crate::voice::VoiceTokenConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the two secrets have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JWT verification (secret, expiry).
    pub jwt: JwtConfig,
    /// Call-session timing rules.
    pub session: SessionPolicy,
    /// Signing settings for voice-channel tokens.
    pub voice: VoiceTokenConfig,
    /// Matchmaker and sweep settings.
    pub jobs: JobConfig,
    /// Spawn the matchmaker and sweeps inside the API process (default: `true`).
    pub run_jobs_in_process: bool,
    /// Optional webhook that receives room and session events.
    pub notify_webhook_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `SESSION_DEFAULT_SECS`    | `300`                   |
    /// | `SESSION_MAX_MINUTES`     | `30`                    |
    /// | `SESSION_EXTENSION_STEPS` | `60,300`                |
    /// | `RUN_JOBS_IN_PROCESS`     | `true`                  |
    /// | `NOTIFY_WEBHOOK_URL`      | unset                   |
    ///
    /// JWT, voice-token and job settings are documented on
    /// [`JwtConfig::from_env`], [`VoiceTokenConfig::from_env`] and
    /// [`JobConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let extension_steps_secs = parse_extension_steps(
            &std::env::var("SESSION_EXTENSION_STEPS").unwrap_or_else(|_| "60,300".into()),
        )
        .unwrap_or_else(|e| panic!("SESSION_EXTENSION_STEPS is invalid: {e}"));

        let session = SessionPolicy {
            default_duration_secs: env_or("SESSION_DEFAULT_SECS", DEFAULT_SESSION_SECS),
            max_minutes_cap: env_or("SESSION_MAX_MINUTES", DEFAULT_MAX_MINUTES),
            extension_steps_secs,
        };
        assert!(
            session.default_duration_secs > 0 && session.max_minutes_cap > 0,
            "SESSION_DEFAULT_SECS and SESSION_MAX_MINUTES must be positive"
        );

        let run_jobs_in_process: bool = std::env::var("RUN_JOBS_IN_PROCESS")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("RUN_JOBS_IN_PROCESS must be true or false");

        let notify_webhook_url = std::env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            session,
            voice: VoiceTokenConfig::from_env(),
            jobs: JobConfig::from_env(),
            run_jobs_in_process,
            notify_webhook_url,
        }
    }
}
