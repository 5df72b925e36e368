//! Error types for the catalog and storage gateway.

use thiserror::Error;

/// Errors that can occur during catalog or storage operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No record for the content id.
    #[error("content not found: {0}")]
    ContentNotFound(String),

    /// A different record already uses the content id.
    #[error("content id {0} is already catalogued with different fields")]
    Conflict(String),

    /// The storage network has no blob with this id.
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// The storage network could not be reached.
    #[error("storage unavailable: {0}")]
    Storage(String),

    /// Invalid data in the catalog.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking task failed or the connection lock was poisoned.
    #[error("catalog task failed: {0}")]
    Task(String),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
