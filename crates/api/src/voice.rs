//! Voice-transport credentials.
//!
//! The voice provider is an external collaborator: members of an active room
//! fetch an opaque token keyed by the room id and hand it to the provider's
//! SDK. [`VoiceTokenIssuer`] is the seam; [`HmacVoiceTokenIssuer`] signs
//! `room.participant.expiry` with a shared secret the provider also holds.

use chrono::Duration;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tandem_core::types::{DbId, Timestamp};

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime in seconds.
const DEFAULT_VOICE_TOKEN_TTL_SECS: i64 = 3600;

/// A credential for joining one room's voice channel.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceToken {
    pub token: String,
    pub room_id: DbId,
    pub expires_at: Timestamp,
}

/// Issues voice-channel credentials for room members.
pub trait VoiceTokenIssuer: Send + Sync {
    fn issue(&self, room_id: DbId, participant_id: DbId, now: Timestamp) -> VoiceToken;
}

/// Signing settings for [`HmacVoiceTokenIssuer`].
#[derive(Debug, Clone)]
pub struct VoiceTokenConfig {
    pub secret: String,
    pub ttl_secs: i64,
}

impl VoiceTokenConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                | Required | Default |
    /// |------------------------|----------|---------|
    /// | `VOICE_TOKEN_SECRET`   | **yes**  | --      |
    /// | `VOICE_TOKEN_TTL_SECS` | no       | `3600`  |
    ///
    /// # Panics
    ///
    /// Panics if `VOICE_TOKEN_SECRET` is missing or empty.
    pub fn from_env() -> Self {
        let secret = std::env::var("VOICE_TOKEN_SECRET")
            .expect("VOICE_TOKEN_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "VOICE_TOKEN_SECRET must not be empty");

        let ttl_secs: i64 = std::env::var("VOICE_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_VOICE_TOKEN_TTL_SECS.to_string())
            .parse()
            .expect("VOICE_TOKEN_TTL_SECS must be a valid i64");

        Self { secret, ttl_secs }
    }
}

/// HMAC-SHA256 token issuer.
///
/// Token format: `{room_id}.{participant_id}.{expires_unix}.{hex signature}`.
pub struct HmacVoiceTokenIssuer {
    config: VoiceTokenConfig,
}

impl HmacVoiceTokenIssuer {
    pub fn new(config: VoiceTokenConfig) -> Self {
        Self { config }
    }

    fn mac(&self, claims: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(claims.as_bytes());
        mac
    }

    /// Check a token's signature and expiry.
    ///
    /// Returns `(room_id, participant_id)` for a valid, unexpired token.
    pub fn verify(&self, token: &str, now: Timestamp) -> Option<(DbId, DbId)> {
        let (claims, signature) = token.rsplit_once('.')?;
        let mut parts = claims.split('.');
        let room_id: DbId = parts.next()?.parse().ok()?;
        let participant_id: DbId = parts.next()?.parse().ok()?;
        let expires: i64 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || expires <= now.timestamp() {
            return None;
        }

        let signature = decode_hex(signature)?;
        self.mac(claims).verify_slice(&signature).ok()?;
        Some((room_id, participant_id))
    }
}

impl VoiceTokenIssuer for HmacVoiceTokenIssuer {
    fn issue(&self, room_id: DbId, participant_id: DbId, now: Timestamp) -> VoiceToken {
        let expires_at = now + Duration::seconds(self.config.ttl_secs);
        let claims = format!("{room_id}.{participant_id}.{}", expires_at.timestamp());
        let signature = encode_hex(self.mac(&claims).finalize().into_bytes());
        VoiceToken {
            token: format!("{claims}.{signature}"),
            room_id,
            expires_at,
        }
    }
}

fn encode_hex(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
