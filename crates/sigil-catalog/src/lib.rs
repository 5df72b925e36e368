//! # Sigil Catalog
//!
//! Where content lives and how it is gated.
//!
//! ## Overview
//!
//! A [`ContentRecord`] maps a content id to the blob holding its bytes,
//! the resource id it is encrypted under, whether the stored bytes are
//! actually ciphertext, and its access policy. Many records may share one
//! resource id. Records are kept behind the [`Catalog`] trait:
//!
//! - [`SqliteCatalog`] - SQLite-backed local cache
//! - [`MemoryCatalog`] - In-memory catalog for tests
//!
//! Blob bytes go through a [`StorageGateway`]; [`MemoryStorage`] addresses
//! blobs by the hex Blake3 of their content.

pub mod error;
pub mod memory;
pub mod migration;
pub mod record;
pub mod sqlite;
pub mod storage;
pub mod traits;

pub use error::{CatalogError, Result};
pub use memory::MemoryCatalog;
pub use record::{AccessPolicy, BlobId, ContentRecord};
pub use sqlite::SqliteCatalog;
pub use storage::memory::MemoryStorage;
pub use storage::StorageGateway;
pub use traits::{Catalog, CatalogExt, InsertResult};
