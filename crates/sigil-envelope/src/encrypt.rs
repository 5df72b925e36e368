//! Upload-time encryption.

use std::time::Duration;
use tracing::{debug, info, warn};

use sigil_core::{EncryptionKey, EncryptionNonce, Namespace, ResourceId};
use sigil_keyserver::{identity, KeyServerSet, ShareLeg, WrappedShare};

use crate::error::{EnvelopeError, Result};
use crate::object::{
    associated_data, ContentMetadata, EncryptedObject, PlaintextObject, Scheme, SealedObject,
    ServerShare,
};
use crate::threshold;

/// Settings shared by the encryption and decryption engines.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// When false, every upload is stored as tagged plaintext.
    pub enabled: bool,
    /// Key servers needed to recover a data key.
    pub threshold: u8,
    /// Check each key server's proof of possession before sealing to it.
    pub verify_servers: bool,
    /// Bound on each key-server round trip.
    pub timeout: Duration,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1,
            verify_servers: true,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Encrypts content for a namespace and resource id.
pub struct EncryptionEngine {
    servers: KeyServerSet,
    config: EnvelopeConfig,
}

impl EncryptionEngine {
    pub fn new(servers: KeyServerSet, config: EnvelopeConfig) -> Self {
        Self { servers, config }
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Encrypt `plaintext` under `namespace || resource_id`.
    ///
    /// Never fails: when encryption is disabled or the key servers cannot
    /// be used, the content comes back as [`EncryptedObject::Plaintext`].
    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        namespace: Namespace,
        resource_id: ResourceId,
        metadata: ContentMetadata,
    ) -> EncryptedObject {
        match self.seal(plaintext, namespace, resource_id, &metadata).await {
            Ok(sealed) => {
                info!(
                    resource = %resource_id,
                    bytes = plaintext.len(),
                    servers = sealed.shares.len(),
                    threshold = sealed.threshold,
                    "content encrypted"
                );
                EncryptedObject::Ciphertext(sealed)
            }
            Err(e) => {
                warn!(resource = %resource_id, error = %e, "storing content unencrypted");
                EncryptedObject::Plaintext(PlaintextObject {
                    namespace,
                    resource_id,
                    data: plaintext.to_vec(),
                    metadata,
                })
            }
        }
    }

    async fn seal(
        &self,
        plaintext: &[u8],
        namespace: Namespace,
        resource_id: ResourceId,
        metadata: &ContentMetadata,
    ) -> Result<SealedObject> {
        if !self.config.enabled {
            return Err(EnvelopeError::EncryptionUnavailable(
                "encryption is disabled".into(),
            ));
        }

        let threshold = self.config.threshold;
        let servers = self
            .servers
            .discover(self.config.timeout, self.config.verify_servers)
            .await;
        if servers.len() < usize::from(threshold) {
            return Err(EnvelopeError::EncryptionUnavailable(format!(
                "{} usable key servers, threshold is {}",
                servers.len(),
                threshold
            )));
        }
        debug!(servers = servers.len(), threshold, "sealing data key");

        let key = EncryptionKey::generate();
        let id = identity(&namespace, &resource_id);
        let shares = threshold::split(&key, threshold, servers.len())?
            .iter()
            .zip(&servers)
            .map(|(share, server)| {
                WrappedShare::seal(share, &server.encryption_key, ShareLeg::ToServer, &id).map(
                    |share| ServerShare {
                        server: server.id,
                        share,
                    },
                )
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EnvelopeError::EncryptionUnavailable(e.to_string()))?;

        let aad = associated_data(
            Scheme::ThresholdChaCha20Poly1305,
            &namespace,
            &resource_id,
            threshold,
            metadata,
        )?;
        let nonce = EncryptionNonce::generate();
        let ciphertext = key
            .encrypt(plaintext, &aad, &nonce)
            .map_err(|e| EnvelopeError::EncryptionUnavailable(e.to_string()))?;

        Ok(SealedObject {
            namespace,
            resource_id,
            threshold,
            shares,
            nonce,
            ciphertext,
            metadata: metadata.clone(),
        })
    }
}
