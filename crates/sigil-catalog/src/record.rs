//! Catalog records.

use serde::{Deserialize, Serialize};
use std::fmt;

use sigil_core::{Blake3Hash, ContentId, Namespace, ResourceId};

use crate::error::{CatalogError, Result};

/// Identifier of a blob on the storage network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CatalogError::InvalidData("empty blob id".into()));
        }
        Ok(Self(id))
    }

    /// Content address of `bytes`: hex Blake3.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        Self(Blake3Hash::hash(bytes).to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who may view a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    Public,
    SubscriberGated,
}

impl AccessPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::SubscriberGated => "subscriber_gated",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(Self::Public),
            "subscriber_gated" => Ok(Self::SubscriberGated),
            other => Err(CatalogError::InvalidData(format!(
                "unknown access policy: {other}"
            ))),
        }
    }
}

/// One content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content_id: ContentId,
    pub blob_id: BlobId,
    pub namespace: Namespace,
    pub resource_id: ResourceId,
    /// True only when the stored blob is threshold ciphertext.
    pub encrypted: bool,
    pub policy: AccessPolicy,
    pub content_type: String,
    pub created_at_ms: i64,
}

impl ContentRecord {
    /// Whether viewing needs a session, a proof and the key servers.
    ///
    /// A gated record whose upload fell back to plaintext is not gated in
    /// practice and reports false.
    pub fn requires_key(&self) -> bool {
        self.encrypted && self.policy == AccessPolicy::SubscriberGated
    }
}
