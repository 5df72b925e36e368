//! Key-server request and response types.

use serde::{Deserialize, Serialize};
use std::fmt;

use sigil_core::canonical::{bytes, int_map, uint};
use sigil_core::{
    encode_canonical, Ed25519PublicKey, Ed25519Signature, Keypair, Namespace, ResourceId,
    X25519PublicKey,
};
use sigil_session::{Certificate, SessionKey};

use crate::error::{KeyServerError, Result};
use crate::share::WrappedShare;

/// Current request format version.
pub const REQUEST_VERSION: u64 = 1;

/// Identifier of a key server: the Blake3 hash of its verifying key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyServerId(pub [u8; 32]);

impl KeyServerId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the id a server with this verifying key must use.
    pub fn for_verifying_key(key: &Ed25519PublicKey) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key("sigil-keyserver-id-v1");
        hasher.update(key.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for KeyServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyServerId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for KeyServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..16])
    }
}

/// What a key server publishes about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerInfo {
    pub id: KeyServerId,
    pub name: String,
    /// Shares are sealed to this key.
    pub encryption_key: X25519PublicKey,
    pub verifying_key: Ed25519PublicKey,
    /// Signature by `verifying_key` over the id and encryption key.
    pub possession: Ed25519Signature,
}

impl KeyServerInfo {
    fn possession_message(id: &KeyServerId, encryption_key: &X25519PublicKey) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_derive_key("sigil-keyserver-possession-v1");
        hasher.update(id.as_bytes());
        hasher.update(encryption_key.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Publish `encryption_key` under the identity of `signing`.
    pub fn new(name: impl Into<String>, signing: &Keypair, encryption_key: X25519PublicKey) -> Self {
        let verifying_key = signing.public_key();
        let id = KeyServerId::for_verifying_key(&verifying_key);
        let possession = signing.sign(&Self::possession_message(&id, &encryption_key));
        Self {
            id,
            name: name.into(),
            encryption_key,
            verifying_key,
            possession,
        }
    }

    /// Check that the id matches the verifying key and that the holder of
    /// that key vouches for the encryption key.
    pub fn verify(&self) -> Result<()> {
        if KeyServerId::for_verifying_key(&self.verifying_key) != self.id {
            return Err(KeyServerError::UnverifiedServer(self.name.clone()));
        }
        self.verifying_key
            .verify(
                &Self::possession_message(&self.id, &self.encryption_key),
                &self.possession,
            )
            .map_err(|_| KeyServerError::UnverifiedServer(self.name.clone()))
    }
}

/// A request for one server's key share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchKeyRequest {
    pub certificate: Certificate,
    /// Serialized proof transaction.
    pub proof: Vec<u8>,
    pub namespace: Namespace,
    pub resource_id: ResourceId,
    /// This server's share, exactly as stored in the ciphertext object.
    pub share: WrappedShare,
    /// The share is returned sealed to this key.
    pub response_key: X25519PublicKey,
    /// Signature by the session key over [`FetchKeyRequest::signing_payload`].
    pub signature: Ed25519Signature,
}

impl FetchKeyRequest {
    /// Build and sign a request with `session`.
    pub fn new(
        session: &SessionKey,
        proof: Vec<u8>,
        namespace: Namespace,
        resource_id: ResourceId,
        share: WrappedShare,
        response_key: X25519PublicKey,
    ) -> Result<Self> {
        let payload = Self::payload(&proof, &namespace, &resource_id, &share, &response_key)?;
        Ok(Self {
            certificate: session.certificate(),
            proof,
            namespace,
            resource_id,
            share,
            response_key,
            signature: session.sign_request(&payload),
        })
    }

    fn payload(
        proof: &[u8],
        namespace: &Namespace,
        resource_id: &ResourceId,
        share: &WrappedShare,
        response_key: &X25519PublicKey,
    ) -> Result<Vec<u8>> {
        let value = int_map(vec![
            (0, uint(REQUEST_VERSION)),
            (1, bytes(proof)),
            (2, bytes(namespace.as_bytes())),
            (3, bytes(resource_id.as_bytes())),
            (4, bytes(share.ephemeral_public.as_bytes())),
            (5, bytes(share.nonce.as_bytes())),
            (6, bytes(&share.ciphertext)),
            (7, bytes(response_key.as_bytes())),
        ]);
        Ok(encode_canonical(&value)?)
    }

    /// The canonical bytes the session key signs.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        Self::payload(
            &self.proof,
            &self.namespace,
            &self.resource_id,
            &self.share,
            &self.response_key,
        )
    }

    /// Check the request signature against the certificate's session key.
    pub fn verify_signature(&self) -> Result<()> {
        self.certificate
            .session_key
            .verify(&self.signing_payload()?, &self.signature)
            .map_err(|_| KeyServerError::InvalidRequest("bad request signature".into()))
    }
}

/// A server's answer: its share, sealed to the request's response key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchKeyResponse {
    pub server: KeyServerId,
    pub share: WrappedShare,
}
