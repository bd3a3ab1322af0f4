use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::Deserialize;

/// Lifetime stamped on credentials that do not say otherwise: 16 minutes.
pub const DEFAULT_CREDENTIAL_LIFETIME_SECS: u64 = 16 * 60;

/// Longest accepted credential lifetime: 100 years.
pub const MAX_CREDENTIAL_LIFETIME_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct GateConfig {
    #[serde(default, rename = "credential_lifetime_secs")]
    pub credential_lifetime: CredentialLifetime,
}

impl GateConfig {
    /// Parse a configuration document such as `{"credential_lifetime_secs": 900}`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse credential gate configuration")
    }
}

/// How long a credential is considered fresh after it is written. Never zero.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "u64")]
pub struct CredentialLifetime(Duration);

impl CredentialLifetime {
    pub fn from_secs(secs: u64) -> Result<Self> {
        Self::try_from(secs)
    }
}

impl std::ops::Deref for CredentialLifetime {
    type Target = Duration;

    fn deref(&self) -> &Duration {
        &self.0
    }
}

impl Default for CredentialLifetime {
    fn default() -> Self {
        Self(Duration::seconds(DEFAULT_CREDENTIAL_LIFETIME_SECS as i64))
    }
}

impl TryFrom<u64> for CredentialLifetime {
    type Error = anyhow::Error;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        if secs == 0 {
            bail!("credential lifetime must be greater than zero")
        }
        if secs > MAX_CREDENTIAL_LIFETIME_SECS {
            bail!(
                "credential lifetime of {secs}s exceeds the maximum of {MAX_CREDENTIAL_LIFETIME_SECS}s"
            )
        }
        Ok(Self(Duration::seconds(secs as i64)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_to_sixteen_minutes() {
        let config = GateConfig::default();
        assert_eq!(*config.credential_lifetime, Duration::minutes(16));

        let config = GateConfig::from_json("{}").unwrap();
        assert_eq!(*config.credential_lifetime, Duration::minutes(16));
    }

    #[test]
    fn custom_lifetime() {
        let config = GateConfig::from_json(r#"{"credential_lifetime_secs": 300}"#).unwrap();
        assert_eq!(*config.credential_lifetime, Duration::minutes(5));
    }

    #[test]
    fn zero_lifetime_is_rejected() {
        assert!(GateConfig::from_json(r#"{"credential_lifetime_secs": 0}"#).is_err());
        assert!(CredentialLifetime::from_secs(0).is_err());
    }

    #[test]
    fn oversized_lifetime_is_rejected() {
        assert!(CredentialLifetime::from_secs(u64::MAX).is_err());
        assert!(CredentialLifetime::from_secs(MAX_CREDENTIAL_LIFETIME_SECS + 1).is_err());
        assert!(
            GateConfig::from_json(r#"{"credential_lifetime_secs": 9000000000000}"#).is_err()
        );
    }

    #[test]
    fn maximum_lifetime_is_accepted() {
        let lifetime = CredentialLifetime::from_secs(MAX_CREDENTIAL_LIFETIME_SECS).unwrap();
        assert_eq!(*lifetime, Duration::days(100 * 365));
    }
}
