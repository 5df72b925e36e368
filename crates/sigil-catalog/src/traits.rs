//! Catalog trait: the abstract interface for content records.

use async_trait::async_trait;

use sigil_core::{ContentId, ResourceId};

use crate::error::{CatalogError, Result};
use crate::record::ContentRecord;

/// Result of inserting a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// An identical record already exists (idempotent, not an error).
    AlreadyExists,
}

/// Async interface for content records.
///
/// # Design Notes
///
/// - **Idempotent inserts**: inserting the same record twice returns
///   `AlreadyExists`; a different record under the same content id is a
///   [`CatalogError::Conflict`].
/// - **Shared resource ids**: many records may point at one resource id.
#[async_trait]
pub trait Catalog: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a record.
    async fn insert(&self, record: &ContentRecord) -> Result<InsertResult>;

    /// Get a record by content id.
    async fn get(&self, content_id: &ContentId) -> Result<Option<ContentRecord>>;

    /// Remove a record. Returns whether one existed.
    async fn remove(&self, content_id: &ContentId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// All records under a resource id, ordered by content id.
    async fn by_resource(&self, resource_id: &ResourceId) -> Result<Vec<ContentRecord>>;

    /// Number of records.
    async fn count(&self) -> Result<u64>;
}

/// Extension trait for common catalog patterns.
pub trait CatalogExt: Catalog {
    /// Get a record, failing with [`CatalogError::ContentNotFound`].
    fn require(
        &self,
        content_id: &ContentId,
    ) -> impl std::future::Future<Output = Result<ContentRecord>> + Send;
}

impl<C: Catalog + ?Sized> CatalogExt for C {
    async fn require(&self, content_id: &ContentId) -> Result<ContentRecord> {
        self.get(content_id)
            .await?
            .ok_or_else(|| CatalogError::ContentNotFound(content_id.to_string()))
    }
}
