//! SQLite implementation of the Catalog trait.
//!
//! rusqlite with bundled SQLite; every call runs on the blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use sigil_core::{ContentId, Namespace, ResourceId};

use crate::error::{CatalogError, Result};
use crate::migration;
use crate::record::{AccessPolicy, BlobId, ContentRecord};
use crate::traits::{Catalog, InsertResult};

/// SQLite-backed catalog. Thread-safe via internal Mutex.
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Open a catalog at `path`, creating and migrating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory catalog.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| CatalogError::Task(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await
        .map_err(|e| CatalogError::Task(format!("spawn_blocking failed: {e}")))?
    }
}

const COLUMNS: &str =
    "content_id, blob_id, namespace, resource_id, encrypted, policy, content_type, created_at";

fn id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, "32-byte id".into(), Type::Blob)
    })
}

fn text_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(String) -> Result<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ContentRecord> {
    Ok(ContentRecord {
        content_id: text_column(row, 0, |s| {
            ContentId::new(s).map_err(|e| CatalogError::InvalidData(e.to_string()))
        })?,
        blob_id: text_column(row, 1, BlobId::new)?,
        namespace: Namespace::from_bytes(id_column(row, 2)?),
        resource_id: ResourceId::from_bytes(id_column(row, 3)?),
        encrypted: row.get::<_, i64>(4)? != 0,
        policy: text_column(row, 5, |s| AccessPolicy::parse(&s))?,
        content_type: row.get(6)?,
        created_at_ms: row.get(7)?,
    })
}

fn select_one(conn: &Connection, content_id: &ContentId) -> Result<Option<ContentRecord>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM content WHERE content_id = ?1"),
        params![content_id.as_str()],
        row_to_record,
    )
    .optional()
    .map_err(CatalogError::from)
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn insert(&self, record: &ContentRecord) -> Result<InsertResult> {
        let record = record.clone();
        self.blocking(move |conn| {
            if let Some(existing) = select_one(conn, &record.content_id)? {
                if existing == record {
                    return Ok(InsertResult::AlreadyExists);
                }
                return Err(CatalogError::Conflict(record.content_id.to_string()));
            }

            conn.execute(
                &format!("INSERT INTO content ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    record.content_id.as_str(),
                    record.blob_id.as_str(),
                    record.namespace.as_bytes().as_slice(),
                    record.resource_id.as_bytes().as_slice(),
                    i64::from(record.encrypted),
                    record.policy.as_str(),
                    record.content_type,
                    record.created_at_ms,
                ],
            )?;
            debug!(content = %record.content_id, blob = %record.blob_id, "catalogued content");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get(&self, content_id: &ContentId) -> Result<Option<ContentRecord>> {
        let content_id = content_id.clone();
        self.blocking(move |conn| select_one(conn, &content_id)).await
    }

    async fn remove(&self, content_id: &ContentId) -> Result<bool> {
        let content_id = content_id.clone();
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM content WHERE content_id = ?1",
                params![content_id.as_str()],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn by_resource(&self, resource_id: &ResourceId) -> Result<Vec<ContentRecord>> {
        let resource_id = *resource_id;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM content WHERE resource_id = ?1 ORDER BY content_id"
            ))?;
            let records = stmt
                .query_map(params![resource_id.as_bytes().as_slice()], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.blocking(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}
