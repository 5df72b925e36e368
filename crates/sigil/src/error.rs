//! Error types for the Gate.

use thiserror::Error;

use sigil_catalog::CatalogError;
use sigil_core::CoreError;
use sigil_envelope::EnvelopeError;
use sigil_keyserver::KeyServerError;
use sigil_proof::ProofError;
use sigil_session::SessionError;

/// Errors that can occur during Gate operations.
#[derive(Debug, Error)]
pub enum GateError {
    /// Session acquisition failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The authorization proof could not be built.
    #[error("proof error: {0}")]
    Proof(#[from] ProofError),

    /// Decryption failed.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// An id could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] CoreError),

    /// The content id is not catalogued.
    #[error("content not found: {0}")]
    ContentNotFound(String),

    /// The storage network failed or lacks the blob.
    #[error("storage error: {0}")]
    Storage(String),

    /// The catalog failed.
    #[error("catalog error: {0}")]
    Catalog(CatalogError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<CatalogError> for GateError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::ContentNotFound(id) => Self::ContentNotFound(id),
            CatalogError::Storage(_) | CatalogError::BlobNotFound(_) => {
                Self::Storage(e.to_string())
            }
            other => Self::Catalog(other),
        }
    }
}

impl From<KeyServerError> for GateError {
    fn from(e: KeyServerError) -> Self {
        Self::Envelope(e.into())
    }
}

impl GateError {
    /// The decryption failure, if this is one.
    pub fn envelope(&self) -> Option<&EnvelopeError> {
        match self {
            Self::Envelope(e) => Some(e),
            _ => None,
        }
    }

    /// A message to show the viewer.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Session(SessionError::SigningRejected(_)) => {
                "Connect your wallet and approve the signature request to continue."
            }
            Self::Session(SessionError::SigningTimeout { .. }) => {
                "The signature request timed out. Please try again."
            }
            Self::Session(SessionError::InvalidTtl { .. }) | Self::Config(_) => {
                "This app is misconfigured. Please contact the creator."
            }
            Self::Proof(ProofError::MissingAuthorizationObject)
            | Self::Envelope(EnvelopeError::AccessDenied(_)) => "Subscribe to unlock this content.",
            Self::Proof(_) | Self::Envelope(EnvelopeError::InvalidProof(_)) => {
                "Your access pass could not be verified. Please refresh and try again."
            }
            Self::Envelope(EnvelopeError::SessionExpired) => {
                "Your session has expired. Sign again to continue."
            }
            Self::Envelope(EnvelopeError::NetworkUnavailable(_)) => {
                "The key network is unreachable. Please try again shortly."
            }
            Self::Envelope(EnvelopeError::MalformedCiphertext(_)) => {
                "This content is damaged and cannot be opened."
            }
            Self::Envelope(EnvelopeError::EncryptionUnavailable(_)) => {
                "Encryption is unavailable right now."
            }
            Self::InvalidIdentifier(_) => "That link is not valid.",
            Self::ContentNotFound(_) => "This content no longer exists.",
            Self::Storage(_) | Self::Catalog(_) => {
                "The content could not be downloaded. Please try again."
            }
        }
    }
}

/// Result type for Gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
