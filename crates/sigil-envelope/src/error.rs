//! Error types for encryption and decryption.

use thiserror::Error;

use sigil_core::CoreError;
use sigil_keyserver::KeyServerError;

/// Errors from the envelope engines.
///
/// `Clone` because every caller sharing one in-flight decryption receives
/// the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Encryption could not run; the caller falls back to plaintext.
    #[error("encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    /// The key servers' policy evaluation rejected the proof.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The session key's lifetime has passed.
    #[error("session expired")]
    SessionExpired,

    /// The bytes were not produced by this scheme, or were tampered with.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// The proof does not match the object or the session.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// Too few key servers answered.
    #[error("key servers unavailable: {0}")]
    NetworkUnavailable(String),
}

impl EnvelopeError {
    /// Rank used to pick one error out of several server failures.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            Self::AccessDenied(_) => 5,
            Self::SessionExpired => 4,
            Self::MalformedCiphertext(_) => 3,
            Self::InvalidProof(_) => 2,
            Self::NetworkUnavailable(_) => 1,
            Self::EncryptionUnavailable(_) => 0,
        }
    }

    /// Whether trying the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }
}

impl From<KeyServerError> for EnvelopeError {
    fn from(e: KeyServerError) -> Self {
        match e {
            KeyServerError::AccessDenied(reason) => Self::AccessDenied(reason),
            KeyServerError::SessionExpired | KeyServerError::InvalidCertificate(_) => {
                Self::SessionExpired
            }
            KeyServerError::InvalidProof(reason) => Self::InvalidProof(reason),
            KeyServerError::InvalidRequest(reason) => Self::MalformedCiphertext(reason),
            KeyServerError::Core(e) => Self::MalformedCiphertext(e.to_string()),
            other @ (KeyServerError::UnverifiedServer(_)
            | KeyServerError::Unavailable(_)
            | KeyServerError::Ledger(_)) => Self::NetworkUnavailable(other.to_string()),
        }
    }
}

impl From<CoreError> for EnvelopeError {
    fn from(e: CoreError) -> Self {
        Self::MalformedCiphertext(e.to_string())
    }
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;
