//! Share wrapping.
//!
//! A key share travels twice: from the encrypting client to a key server
//! (sealed to the server's long-lived X25519 key, stored inside the
//! ciphertext object) and from the key server back to a decrypting client
//! (sealed to the client's per-request response key). Both legs use
//! ephemeral-static X25519, a Blake3-derived wrapping key and
//! ChaCha20-Poly1305.
//!
//! The wrapping key is bound to a context built from the identity
//! (`namespace || resource id`), so a share sealed for one resource
//! cannot be opened under another.

use serde::{Deserialize, Serialize};

use sigil_core::{
    EncryptionNonce, EphemeralKeyPair, Namespace, ResourceId, X25519PublicKey, X25519StaticSecret,
};

use crate::error::{KeyServerError, Result};

const INBOUND_LABEL: &[u8] = b"sigil/share/to-server";
const OUTBOUND_LABEL: &[u8] = b"sigil/share/to-client";

/// The identity content is encrypted under: `namespace || resource id`.
pub fn identity(namespace: &Namespace, resource: &ResourceId) -> Vec<u8> {
    let mut id = Vec::with_capacity(64);
    id.extend_from_slice(namespace.as_bytes());
    id.extend_from_slice(resource.as_bytes());
    id
}

/// Which leg of the trip a share is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareLeg {
    /// Client to key server, stored in the ciphertext object.
    ToServer,
    /// Key server back to the decrypting client.
    ToClient,
}

impl ShareLeg {
    fn context(self, identity: &[u8]) -> Vec<u8> {
        let label = match self {
            Self::ToServer => INBOUND_LABEL,
            Self::ToClient => OUTBOUND_LABEL,
        };
        let mut context = Vec::with_capacity(label.len() + identity.len());
        context.extend_from_slice(label);
        context.extend_from_slice(identity);
        context
    }
}

/// A key share sealed to one X25519 recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedShare {
    pub ephemeral_public: X25519PublicKey,
    pub nonce: EncryptionNonce,
    pub ciphertext: Vec<u8>,
}

impl WrappedShare {
    /// Seal `share` so only the holder of `recipient`'s secret can open it.
    pub fn seal(
        share: &[u8],
        recipient: &X25519PublicKey,
        leg: ShareLeg,
        identity: &[u8],
    ) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let context = leg.context(identity);
        let wrap_key = ephemeral
            .diffie_hellman(recipient)
            .derive_encryption_key(&context);

        let nonce = EncryptionNonce::generate();
        let ciphertext = wrap_key.encrypt(share, &context, &nonce)?;

        Ok(Self {
            ephemeral_public,
            nonce,
            ciphertext,
        })
    }

    /// Open with the recipient's secret.
    pub fn open(
        &self,
        recipient: &X25519StaticSecret,
        leg: ShareLeg,
        identity: &[u8],
    ) -> Result<Vec<u8>> {
        let context = leg.context(identity);
        let wrap_key = recipient
            .diffie_hellman(&self.ephemeral_public)
            .derive_encryption_key(&context);
        wrap_key
            .decrypt(&self.ciphertext, &context, &self.nonce)
            .map_err(|_| KeyServerError::InvalidRequest("share cannot be opened".into()))
    }
}
