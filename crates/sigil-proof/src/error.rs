//! Error types for proof construction and parsing.

use thiserror::Error;

use sigil_core::CoreError;

/// Errors that can occur while building or reading a proof transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// No authorization object was supplied.
    #[error("no authorization object available")]
    MissingAuthorizationObject,

    /// An id of one kind was given where the other kind was required.
    #[error("expected a {expected} id, got a {found} id")]
    WrongAuthorizationKind {
        expected: &'static str,
        found: &'static str,
    },

    /// The id is not a recognisable authorization id.
    #[error("invalid authorization id: {0}")]
    InvalidAuthorizationId(String),

    /// The transaction bytes do not describe a policy call.
    #[error("malformed proof transaction: {0}")]
    Malformed(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for proof operations.
pub type Result<T> = std::result::Result<T, ProofError>;
