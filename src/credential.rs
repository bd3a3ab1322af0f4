use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A short-lived set of security credentials.
///
/// Serializes to the document vended to credential consumers:
///
/// ```json
/// {
///   "AccessKeyId": "...",
///   "SecretAccessKey": "...",
///   "Token": "...",
///   "Expiration": "2024-01-01T00:16:00Z"
/// }
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "Token")]
    pub session_token: String,
    /// Informational only, nothing is evicted once this passes.
    #[serde(rename = "Expiration")]
    pub expiration: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            access_key_id,
            secret_access_key,
            session_token,
            expiration,
        }
    }

    /// A credential issued at `issued_at` that expires `lifetime` later, or at the latest
    /// representable instant if that overflows.
    pub fn issued(
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        let expiration = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(access_key_id, secret_access_key, session_token, expiration)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }

    /// Time left before expiration, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expiration - now).max(Duration::zero())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}
