//! Error types for session keys.

use thiserror::Error;

/// Errors that can occur while acquiring a session key.
///
/// `Clone` so that callers coalesced onto one wallet prompt all receive
/// the same failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The wallet declined, failed, or returned a signature that does not
    /// belong to the requesting address.
    #[error("signing rejected: {0}")]
    SigningRejected(String),

    /// The wallet did not answer within the signing window.
    #[error("signing timed out after {waited_ms} ms")]
    SigningTimeout { waited_ms: u64 },

    /// Requested time-to-live is outside the accepted range.
    #[error("session ttl must be between {min} and {max} minutes, got {got}")]
    InvalidTtl { got: u32, min: u32, max: u32 },
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
