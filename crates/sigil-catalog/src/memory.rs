//! In-memory implementation of the Catalog trait.
//!
//! Same semantics as SQLite, nothing persisted.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use sigil_core::{ContentId, ResourceId};

use crate::error::{CatalogError, Result};
use crate::record::ContentRecord;
use crate::traits::{Catalog, InsertResult};

/// In-memory catalog. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryCatalog {
    records: RwLock<BTreeMap<ContentId, ContentRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> CatalogError {
    CatalogError::Task("catalog lock poisoned".into())
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn insert(&self, record: &ContentRecord) -> Result<InsertResult> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        match records.get(&record.content_id) {
            Some(existing) if existing == record => Ok(InsertResult::AlreadyExists),
            Some(_) => Err(CatalogError::Conflict(record.content_id.to_string())),
            None => {
                records.insert(record.content_id.clone(), record.clone());
                Ok(InsertResult::Inserted)
            }
        }
    }

    async fn get(&self, content_id: &ContentId) -> Result<Option<ContentRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(content_id).cloned())
    }

    async fn remove(&self, content_id: &ContentId) -> Result<bool> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        Ok(records.remove(content_id).is_some())
    }

    async fn by_resource(&self, resource_id: &ResourceId) -> Result<Vec<ContentRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .values()
            .filter(|r| &r.resource_id == resource_id)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AccessPolicy, BlobId};
    use crate::traits::CatalogExt;
    use sigil_core::Namespace;

    fn record(id: &str, resource: u8) -> ContentRecord {
        ContentRecord {
            content_id: ContentId::new(id).unwrap(),
            blob_id: BlobId::for_bytes(id.as_bytes()),
            namespace: Namespace::from_bytes([1; 32]),
            resource_id: ResourceId::from_bytes([resource; 32]),
            encrypted: true,
            policy: AccessPolicy::SubscriberGated,
            content_type: "text/markdown".into(),
            created_at_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn test_memory_catalog_basic() {
        let catalog = MemoryCatalog::new();
        let r = record("essay", 7);

        assert_eq!(catalog.insert(&r).await.unwrap(), InsertResult::Inserted);
        assert_eq!(catalog.get(&r.content_id).await.unwrap(), Some(r.clone()));
        assert_eq!(catalog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_catalog_idempotent_and_conflict() {
        let catalog = MemoryCatalog::new();
        let r = record("essay", 7);
        catalog.insert(&r).await.unwrap();

        assert_eq!(catalog.insert(&r).await.unwrap(), InsertResult::AlreadyExists);

        let mut changed = r.clone();
        changed.encrypted = false;
        assert!(matches!(
            catalog.insert(&changed).await,
            Err(CatalogError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_catalog_by_resource_and_remove() {
        let catalog = MemoryCatalog::new();
        for (id, resource) in [("b", 1), ("a", 1), ("c", 2)] {
            catalog.insert(&record(id, resource)).await.unwrap();
        }

        let shared = catalog
            .by_resource(&ResourceId::from_bytes([1; 32]))
            .await
            .unwrap();
        let ids: Vec<&str> = shared.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let gone = ContentId::new("a").unwrap();
        assert!(catalog.remove(&gone).await.unwrap());
        assert!(!catalog.remove(&gone).await.unwrap());
        assert!(matches!(
            catalog.require(&gone).await,
            Err(CatalogError::ContentNotFound(_))
        ));
    }
}
