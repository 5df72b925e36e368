//! Error types for key-server calls.

use thiserror::Error;

use sigil_core::CoreError;

/// Errors a key server (or the path to it) can report.
///
/// `Clone` because one server's answer may be shared by every caller
/// waiting on the same decryption.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyServerError {
    /// The access policy rejected the proof.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The session certificate's lifetime has passed.
    #[error("session expired")]
    SessionExpired,

    /// The session certificate is not validly signed by its wallet.
    #[error("invalid session certificate: {0}")]
    InvalidCertificate(String),

    /// The proof transaction could not be read or targets something else.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The request itself is malformed or not addressed to this server.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server's advertised keys are not backed by a proof of possession.
    #[error("key server {0} failed proof of possession")]
    UnverifiedServer(String),

    /// The server could not be reached or did not answer in time.
    #[error("key server unavailable: {0}")]
    Unavailable(String),

    /// The ledger could not be queried.
    #[error("ledger error: {0}")]
    Ledger(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for key-server operations.
pub type Result<T> = std::result::Result<T, KeyServerError>;
