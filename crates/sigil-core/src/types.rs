//! Strong type definitions for Sigil.
//!
//! All identifiers are newtypes to prevent misuse at compile time: a
//! namespace can never be passed where a resource id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::{Blake3Hash, Ed25519PublicKey, SignatureScheme};
use crate::error::{CoreError, Result};

/// Length in bytes of every ledger identifier.
pub const ID_LENGTH: usize = 32;

/// Strip an optional `0x` marker.
fn strip_marker(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse hex digits into a 32-byte id, left-padding short forms (`0x6`).
fn parse_padded(kind: &'static str, s: &str) -> Result<[u8; ID_LENGTH]> {
    let digits = strip_marker(s.trim());
    if digits.is_empty() || digits.len() > ID_LENGTH * 2 {
        return Err(CoreError::InvalidIdentifier {
            kind,
            reason: format!("expected 1 to 64 hex digits, got {}", digits.len()),
        });
    }
    let padded = format!("{:0>64}", digits);
    decode_exact(kind, &padded)
}

fn decode_exact(kind: &'static str, digits: &str) -> Result<[u8; ID_LENGTH]> {
    let mut out = [0u8; ID_LENGTH];
    hex::decode_to_slice(digits, &mut out).map_err(|e| CoreError::InvalidIdentifier {
        kind,
        reason: e.to_string(),
    })?;
    Ok(out)
}

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; ID_LENGTH]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }

            /// Lowercase hex without the `0x` marker.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex, with or without `0x`, short forms allowed.
            pub fn parse(s: &str) -> Result<Self> {
                parse_padded($kind, s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(0x{})", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; ID_LENGTH]> for $name {
            fn from(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }
        }
    };
}

ledger_id!(
    /// Any on-chain object: capabilities, subscriptions, spaces, the clock.
    ObjectId,
    "object id"
);

ledger_id!(
    /// A wallet address.
    ///
    /// Derived as Blake3(scheme flag || public key) so a key server can
    /// check that a signature's embedded key belongs to the claimed address.
    Address,
    "address"
);

ledger_id!(
    /// The policy package that scopes resource ids and session keys.
    Namespace,
    "namespace"
);

impl ObjectId {
    /// The shared clock object (`0x6`).
    pub const CLOCK: Self = {
        let mut bytes = [0u8; ID_LENGTH];
        bytes[ID_LENGTH - 1] = 6;
        Self(bytes)
    };
}

impl Address {
    /// Derive the address owned by a wallet public key.
    pub fn from_public_key(scheme: SignatureScheme, public_key: &Ed25519PublicKey) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key("sigil-address-v1");
        hasher.update(&[scheme.flag()]);
        hasher.update(public_key.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

/// The identity content is encrypted under and policies are checked against.
///
/// Always 32 bytes, rendered as 64 lowercase hex digits with no `0x`
/// marker, which is the form the key servers index by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub [u8; ID_LENGTH]);

impl ResourceId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; ID_LENGTH] {
        &self.0
    }

    /// Derive from the on-chain object the content belongs to.
    pub const fn from_object(object: &ObjectId) -> Self {
        Self(object.0)
    }

    /// Parse a resource id.
    ///
    /// Exactly 64 hex digits are required; a leading `0x` is stripped.
    pub fn parse(s: &str) -> Result<Self> {
        let digits = strip_marker(s.trim());
        if digits.len() != ID_LENGTH * 2 {
            return Err(CoreError::InvalidIdentifier {
                kind: "resource id",
                reason: format!("expected 64 hex digits, got {}", digits.len()),
            });
        }
        decode_exact("resource id", digits).map(Self)
    }

    /// Fixed-width lowercase hex, no marker.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ResourceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<[u8]> for ResourceId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Identifier of a content item in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    /// Wrap a catalog id. Empty ids are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidIdentifier {
                kind: "content id",
                reason: "empty".into(),
            });
        }
        Ok(Self(id))
    }

    /// Content id for an uncatalogued blob: the hex Blake3 of its bytes.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        Self(Blake3Hash::hash(bytes).to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_short_form_is_padded() {
        let id = ObjectId::parse("0x6").unwrap();
        assert_eq!(id, ObjectId::CLOCK);
        assert_eq!(id.to_string(), format!("0x{}6", "0".repeat(63)));
    }

    #[test]
    fn test_object_id_rejects_garbage() {
        assert!(ObjectId::parse("0x").is_err());
        assert!(ObjectId::parse("0xzz").is_err());
        assert!(ObjectId::parse(&"1".repeat(65)).is_err());
    }

    #[test]
    fn test_resource_id_strips_marker() {
        let hex = "ab".repeat(32);
        let with_marker = ResourceId::parse(&format!("0x{hex}")).unwrap();
        let without = ResourceId::parse(&hex).unwrap();
        assert_eq!(with_marker, without);
        assert_eq!(with_marker.to_string(), hex);
        assert!(!with_marker.to_string().starts_with("0x"));
    }

    #[test]
    fn test_resource_id_is_fixed_width() {
        assert!(ResourceId::parse("0xabc").is_err());
        let upper = "AB".repeat(32);
        assert_eq!(ResourceId::parse(&upper).unwrap().to_hex(), "ab".repeat(32));
    }

    #[test]
    fn test_resource_id_from_object() {
        let object = ObjectId::from_bytes([7u8; 32]);
        let resource = ResourceId::from_object(&object);
        assert_eq!(resource.to_hex(), object.to_hex());
    }

    #[test]
    fn test_content_id() {
        assert!(ContentId::new("  ").is_err());
        let a = ContentId::for_bytes(b"blob");
        let b = ContentId::for_bytes(b"blob");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_ids_serialize_as_bytes() {
        let id = Namespace::from_bytes([1u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        let back: Namespace = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
