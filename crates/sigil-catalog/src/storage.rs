//! Storage gateway: the content-addressed blob network.
//!
//! The network itself is an external collaborator. Callers retry;
//! the gateway does not.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::record::BlobId;

/// Put and get blobs on the storage network.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Store `bytes` and return the id they can be fetched by.
    async fn put(&self, bytes: Bytes) -> Result<BlobId>;

    /// Fetch a blob.
    async fn get(&self, blob_id: &BlobId) -> Result<Bytes>;
}

pub mod memory {
    //! In-process blob store addressed by the hex Blake3 of each blob.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::RwLock;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tracing::debug;

    use super::StorageGateway;
    use crate::error::{CatalogError, Result};
    use crate::record::BlobId;

    pub struct MemoryStorage {
        blobs: RwLock<HashMap<BlobId, Bytes>>,
        online: AtomicBool,
        gets: AtomicUsize,
    }

    impl Default for MemoryStorage {
        fn default() -> Self {
            Self {
                blobs: RwLock::new(HashMap::new()),
                online: AtomicBool::new(true),
                gets: AtomicUsize::new(0),
            }
        }
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        /// Take the network down, or bring it back.
        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        /// Number of `get` calls received.
        pub fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        /// Overwrite a stored blob in place.
        pub fn corrupt(&self, blob_id: &BlobId, bytes: Bytes) {
            if let Ok(mut blobs) = self.blobs.write() {
                blobs.insert(blob_id.clone(), bytes);
            }
        }

        fn check_online(&self) -> Result<()> {
            if self.online.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(CatalogError::Storage("storage network unreachable".into()))
            }
        }
    }

    fn poisoned() -> CatalogError {
        CatalogError::Task("storage lock poisoned".into())
    }

    #[async_trait]
    impl StorageGateway for MemoryStorage {
        async fn put(&self, bytes: Bytes) -> Result<BlobId> {
            self.check_online()?;
            let id = BlobId::for_bytes(&bytes);
            debug!(blob = %id, bytes = bytes.len(), "stored blob");
            self.blobs
                .write()
                .map_err(|_| poisoned())?
                .insert(id.clone(), bytes);
            Ok(id)
        }

        async fn get(&self, blob_id: &BlobId) -> Result<Bytes> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            self.blobs
                .read()
                .map_err(|_| poisoned())?
                .get(blob_id)
                .cloned()
                .ok_or_else(|| CatalogError::BlobNotFound(blob_id.to_string()))
        }
    }
}
