//! The stored form of uploaded content.
//!
//! ```text
//! bytes       = MAGIC || canonical CBOR map
//! Ciphertext  = { 0: version, 1: scheme=1, 2: namespace, 3: resource id,
//!                 4: threshold, 5: [ServerShare], 6: nonce, 7: ciphertext,
//!                 8: metadata }
//! Plaintext   = { 0: version, 1: scheme=0, 2: namespace, 3: resource id,
//!                 8: metadata, 9: data }
//! ServerShare = { 0: server id, 1: ephemeral key, 2: nonce, 3: sealed share }
//! Metadata    = { 0: file name, 1: content type, 2: timestamp ms }
//! ```
//!
//! Metadata is readable by anyone holding the bytes but is bound to the
//! ciphertext as AEAD associated data, together with the scheme, the
//! identity and the threshold.

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use sigil_core::canonical::{self, bytes, int, int_map, text, uint, CanonicalMap};
use sigil_core::{EncryptionNonce, Namespace, ResourceId, X25519PublicKey};
use sigil_keyserver::{KeyServerId, WrappedShare};

use crate::error::{EnvelopeError, Result};

/// Leading bytes of every stored object.
pub const MAGIC: &[u8; 4] = b"SGL\x01";

/// Current object format version.
pub const OBJECT_VERSION: u64 = 1;

/// How the payload is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Scheme {
    /// Stored in the clear because encryption was unavailable or disabled.
    None = 0,
    /// ChaCha20-Poly1305 under a data key split across key servers.
    ThresholdChaCha20Poly1305 = 1,
}

impl Scheme {
    fn from_u64(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::ThresholdChaCha20Poly1305),
            _ => None,
        }
    }
}

/// Descriptive metadata bound to (not hidden by) the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub file_name: String,
    pub content_type: String,
    pub timestamp_ms: i64,
}

impl ContentMetadata {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            timestamp_ms,
        }
    }

    fn to_value(&self) -> Value {
        int_map(vec![
            (0, text(&self.file_name)),
            (1, text(&self.content_type)),
            (2, int(self.timestamp_ms)),
        ])
    }

    fn from_value(value: &Value) -> Result<Self> {
        let map = CanonicalMap::new(value, "metadata")?;
        Ok(Self {
            file_name: map.text(0, "file name")?.to_string(),
            content_type: map.text(1, "content type")?.to_string(),
            timestamp_ms: map.int(2, "timestamp")?,
        })
    }
}

/// One key server's sealed share of the data key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerShare {
    pub server: KeyServerId,
    pub share: WrappedShare,
}

/// Threshold-encrypted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedObject {
    pub namespace: Namespace,
    pub resource_id: ResourceId,
    pub threshold: u8,
    pub shares: Vec<ServerShare>,
    pub nonce: EncryptionNonce,
    pub ciphertext: Vec<u8>,
    pub metadata: ContentMetadata,
}

/// Content stored in the clear, tagged so nobody mistakes it for gated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaintextObject {
    pub namespace: Namespace,
    pub resource_id: ResourceId,
    pub data: Vec<u8>,
    pub metadata: ContentMetadata,
}

/// The result of an upload-time encryption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedObject {
    Ciphertext(SealedObject),
    Plaintext(PlaintextObject),
}

/// The associated data authenticated with the payload.
pub(crate) fn associated_data(
    scheme: Scheme,
    namespace: &Namespace,
    resource_id: &ResourceId,
    threshold: u8,
    metadata: &ContentMetadata,
) -> Result<Vec<u8>> {
    let value = int_map(vec![
        (0, uint(scheme as u64)),
        (1, bytes(namespace.as_bytes())),
        (2, bytes(resource_id.as_bytes())),
        (3, uint(u64::from(threshold))),
        (4, metadata.to_value()),
    ]);
    Ok(canonical::encode_canonical(&value)?)
}

impl SealedObject {
    pub fn aad(&self) -> Result<Vec<u8>> {
        associated_data(
            Scheme::ThresholdChaCha20Poly1305,
            &self.namespace,
            &self.resource_id,
            self.threshold,
            &self.metadata,
        )
    }
}

fn malformed(reason: impl Into<String>) -> EnvelopeError {
    EnvelopeError::MalformedCiphertext(reason.into())
}

impl EncryptedObject {
    /// False for the plaintext fallback. Consumers must not treat such
    /// content as gated.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Ciphertext(_))
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Ciphertext(_) => Scheme::ThresholdChaCha20Poly1305,
            Self::Plaintext(_) => Scheme::None,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        match self {
            Self::Ciphertext(o) => &o.namespace,
            Self::Plaintext(o) => &o.namespace,
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Self::Ciphertext(o) => &o.resource_id,
            Self::Plaintext(o) => &o.resource_id,
        }
    }

    pub fn metadata(&self) -> &ContentMetadata {
        match self {
            Self::Ciphertext(o) => &o.metadata,
            Self::Plaintext(o) => &o.metadata,
        }
    }

    /// Serialize for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let value = match self {
            Self::Ciphertext(o) => {
                let shares = o
                    .shares
                    .iter()
                    .map(|s| {
                        int_map(vec![
                            (0, bytes(s.server.as_bytes())),
                            (1, bytes(s.share.ephemeral_public.as_bytes())),
                            (2, bytes(s.share.nonce.as_bytes())),
                            (3, bytes(&s.share.ciphertext)),
                        ])
                    })
                    .collect();
                int_map(vec![
                    (0, uint(OBJECT_VERSION)),
                    (1, uint(Scheme::ThresholdChaCha20Poly1305 as u64)),
                    (2, bytes(o.namespace.as_bytes())),
                    (3, bytes(o.resource_id.as_bytes())),
                    (4, uint(u64::from(o.threshold))),
                    (5, Value::Array(shares)),
                    (6, bytes(o.nonce.as_bytes())),
                    (7, bytes(&o.ciphertext)),
                    (8, o.metadata.to_value()),
                ])
            }
            Self::Plaintext(o) => int_map(vec![
                (0, uint(OBJECT_VERSION)),
                (1, uint(Scheme::None as u64)),
                (2, bytes(o.namespace.as_bytes())),
                (3, bytes(o.resource_id.as_bytes())),
                (8, o.metadata.to_value()),
                (9, bytes(&o.data)),
            ]),
        };

        let body = canonical::encode_canonical(&value)?;
        let mut out = Vec::with_capacity(MAGIC.len() + body.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parse stored bytes. Anything not produced by [`EncryptedObject::to_bytes`]
    /// is [`EnvelopeError::MalformedCiphertext`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let body = data
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| malformed("missing object header"))?;
        let value = canonical::decode_canonical(body)?;
        let map = CanonicalMap::new(&value, "object")?;

        let version = map.uint(0, "version")?;
        if version != OBJECT_VERSION {
            return Err(malformed(format!("unsupported object version {version}")));
        }
        let scheme = Scheme::from_u64(map.uint(1, "scheme")?)
            .ok_or_else(|| malformed("unknown scheme"))?;
        let namespace = Namespace::from_bytes(map.bytes32(2, "namespace")?);
        let resource_id = ResourceId::from_bytes(map.bytes32(3, "resource id")?);
        let metadata = ContentMetadata::from_value(
            map.get(8).ok_or_else(|| malformed("missing metadata"))?,
        )?;

        match scheme {
            Scheme::None => Ok(Self::Plaintext(PlaintextObject {
                namespace,
                resource_id,
                data: map.bytes(9, "data")?.to_vec(),
                metadata,
            })),
            Scheme::ThresholdChaCha20Poly1305 => {
                let threshold = u8::try_from(map.uint(4, "threshold")?)
                    .map_err(|_| malformed("threshold out of range"))?;

                let mut shares = Vec::new();
                for item in map.array(5, "shares")? {
                    let entry = CanonicalMap::new(item, "server share")?;
                    shares.push(ServerShare {
                        server: KeyServerId::from_bytes(entry.bytes32(0, "server id")?),
                        share: WrappedShare {
                            ephemeral_public: X25519PublicKey::from_bytes(
                                entry.bytes32(1, "ephemeral key")?,
                            ),
                            nonce: EncryptionNonce::from_bytes(
                                entry
                                    .bytes(2, "share nonce")?
                                    .try_into()
                                    .map_err(|_| malformed("share nonce must be 12 bytes"))?,
                            ),
                            ciphertext: entry.bytes(3, "sealed share")?.to_vec(),
                        },
                    });
                }

                let nonce = EncryptionNonce::from_bytes(
                    map.bytes(6, "nonce")?
                        .try_into()
                        .map_err(|_| malformed("nonce must be 12 bytes"))?,
                );

                Ok(Self::Ciphertext(SealedObject {
                    namespace,
                    resource_id,
                    threshold,
                    shares,
                    nonce,
                    ciphertext: map.bytes(7, "ciphertext")?.to_vec(),
                    metadata,
                }))
            }
        }
    }
}
