//! Gate configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use sigil_envelope::EnvelopeConfig;
use sigil_session::{SessionConfig, MAX_TTL_MINUTES, MIN_TTL_MINUTES};

use crate::error::{GateError, Result};

/// Bounded exponential backoff for retryable key-server failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// Configuration for a [`Gate`](crate::Gate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GateConfig {
    /// Kill switch. When false every upload is stored as tagged plaintext.
    pub enabled: bool,
    /// Key servers needed to recover a data key.
    pub threshold: u32,
    /// Check key servers' proofs of possession before sealing to them.
    pub verify_servers: bool,
    /// Bound on each key-server round trip.
    pub timeout_ms: u32,
    /// Bound on waiting for the wallet to sign.
    pub signing_timeout_ms: u32,
    /// Lifetime of session keys created by [`Gate::view`](crate::Gate::view).
    pub session_ttl_minutes: u32,
    pub retry: RetryPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1,
            verify_servers: true,
            timeout_ms: 20_000,
            signing_timeout_ms: 180_000,
            session_ttl_minutes: 10,
            retry: RetryPolicy::default(),
        }
    }
}

impl GateConfig {
    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults; unknown fields are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| GateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 || self.threshold > u32::from(u8::MAX) {
            return Err(GateError::Config(format!(
                "threshold must be between 1 and 255, got {}",
                self.threshold
            )));
        }
        if self.timeout_ms == 0 {
            return Err(GateError::Config("timeout_ms must be positive".into()));
        }
        if self.signing_timeout_ms == 0 {
            return Err(GateError::Config(
                "signing_timeout_ms must be positive".into(),
            ));
        }
        if !(MIN_TTL_MINUTES..=MAX_TTL_MINUTES).contains(&self.session_ttl_minutes) {
            return Err(GateError::Config(format!(
                "session_ttl_minutes must be between {MIN_TTL_MINUTES} and {MAX_TTL_MINUTES}"
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(GateError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn key_server_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    pub(crate) fn envelope(&self) -> EnvelopeConfig {
        EnvelopeConfig {
            enabled: self.enabled,
            // validate() bounds the threshold to u8.
            threshold: u8::try_from(self.threshold).unwrap_or(u8::MAX),
            verify_servers: self.verify_servers,
            timeout: self.key_server_timeout(),
        }
    }

    pub(crate) fn session(&self) -> SessionConfig {
        SessionConfig {
            signing_timeout: Duration::from_millis(u64::from(self.signing_timeout_ms)),
        }
    }
}
