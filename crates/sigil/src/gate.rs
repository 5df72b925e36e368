//! The Gate: encrypted uploads and proof-gated viewing.
//!
//! The Gate brings together the session cache, the envelope engines, the
//! ledger, the catalog and the storage gateway. It is constructed
//! explicitly and shared by reference; there is no global instance.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

use sigil_catalog::{
    AccessPolicy, BlobId, Catalog, CatalogExt, ContentRecord, MemoryCatalog, MemoryStorage,
    StorageGateway,
};
use sigil_core::{Address, Clock, ContentId, Namespace, ResourceId, SystemClock};
use sigil_envelope::{
    ContentMetadata, DecryptionEngine, EncryptedObject, EncryptionEngine, EnvelopeError,
};
use sigil_keyserver::{KeyServerSet, Ledger};
use sigil_proof::{AuthorizationProofBuilder, ProofError, ProofTx};
use sigil_session::{SessionKey, SessionKeyManager, Signer};

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::retry;

/// The external systems a Gate talks to.
pub struct Collaborators {
    pub key_servers: KeyServerSet,
    pub ledger: Arc<dyn Ledger>,
    pub catalog: Arc<dyn Catalog>,
    pub storage: Arc<dyn StorageGateway>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// In-memory catalog and storage on the system clock.
    pub fn in_memory(key_servers: KeyServerSet, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            key_servers,
            ledger,
            catalog: Arc::new(MemoryCatalog::new()),
            storage: Arc::new(MemoryStorage::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Access-controlled content for one policy namespace.
pub struct Gate {
    namespace: Namespace,
    config: GateConfig,
    clock: Arc<dyn Clock>,
    sessions: SessionKeyManager,
    proofs: AuthorizationProofBuilder,
    encryption: EncryptionEngine,
    decryption: DecryptionEngine,
    ledger: Arc<dyn Ledger>,
    catalog: Arc<dyn Catalog>,
    storage: Arc<dyn StorageGateway>,
}

impl Gate {
    /// Create a Gate for `namespace`. Fails if `config` does not validate.
    pub fn new(namespace: Namespace, config: GateConfig, parts: Collaborators) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            namespace,
            sessions: SessionKeyManager::new(parts.clock.clone(), config.session()),
            proofs: AuthorizationProofBuilder::new(namespace),
            encryption: EncryptionEngine::new(parts.key_servers.clone(), config.envelope()),
            decryption: DecryptionEngine::new(
                parts.key_servers,
                parts.clock.clone(),
                config.key_server_timeout(),
            ),
            clock: parts.clock,
            ledger: parts.ledger,
            catalog: parts.catalog,
            storage: parts.storage,
            config,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionKeyManager {
        &self.sessions
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// Decryption attempts currently in flight.
    pub fn decryptions_in_flight(&self) -> usize {
        self.decryption.in_flight()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt content for upload. Never blocks the upload: when encryption
    /// is off or the key servers are unusable the result is
    /// [`EncryptedObject::Plaintext`].
    pub async fn upload_encrypted(
        &self,
        plaintext: &[u8],
        namespace: Namespace,
        resource_id: ResourceId,
        metadata: ContentMetadata,
    ) -> EncryptedObject {
        self.encryption
            .encrypt(plaintext, namespace, resource_id, metadata)
            .await
    }

    /// Store content and catalogue it under `content_id`.
    ///
    /// Public content is stored as is. Gated content is encrypted under
    /// `resource_id` first; the record's `encrypted` flag says whether that
    /// actually happened.
    pub async fn publish(
        &self,
        content_id: ContentId,
        plaintext: &[u8],
        resource_id: ResourceId,
        policy: AccessPolicy,
        metadata: ContentMetadata,
    ) -> Result<ContentRecord> {
        let content_type = metadata.content_type.clone();
        let (bytes, encrypted) = match policy {
            AccessPolicy::Public => (Bytes::copy_from_slice(plaintext), false),
            AccessPolicy::SubscriberGated => {
                let object = self
                    .upload_encrypted(plaintext, self.namespace, resource_id, metadata)
                    .await;
                let encrypted = object.is_encrypted();
                (Bytes::from(object.to_bytes()?), encrypted)
            }
        };

        let blob_id = self.storage.put(bytes).await?;
        let record = ContentRecord {
            content_id,
            blob_id,
            namespace: self.namespace,
            resource_id,
            encrypted,
            policy,
            content_type,
            created_at_ms: self.clock.now_millis(),
        };
        self.catalog.insert(&record).await?;

        info!(
            content = %record.content_id,
            blob = %record.blob_id,
            resource = %resource_id,
            encrypted,
            policy = policy.as_str(),
            "content published"
        );
        Ok(record)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions and Proofs
    // ─────────────────────────────────────────────────────────────────────────

    /// The cached session for `(address, namespace)` or a freshly signed one.
    pub async fn acquire_session(
        &self,
        address: Address,
        namespace: Namespace,
        ttl_minutes: u32,
        signer: &dyn Signer,
    ) -> Result<Arc<SessionKey>> {
        Ok(self
            .sessions
            .acquire(address, namespace, ttl_minutes, signer)
            .await?)
    }

    /// Forget sessions of every wallet other than `address`; `None` when
    /// the wallet disconnects.
    pub async fn switch_wallet(&self, address: Option<&Address>) {
        self.sessions.retain_address(address).await;
    }

    pub fn build_creator_proof(&self, resource_id: &ResourceId, cap_id: &str) -> Result<ProofTx> {
        Ok(self.proofs.build_creator_proof(resource_id, cap_id)?)
    }

    pub fn build_subscriber_proof(
        &self,
        resource_id: &ResourceId,
        subscription_id: &str,
    ) -> Result<ProofTx> {
        Ok(self.proofs.build_subscriber_proof(resource_id, subscription_id)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decrypt and View
    // ─────────────────────────────────────────────────────────────────────────

    /// Decrypt stored object bytes.
    ///
    /// Concurrent calls for the same bytes and viewer share one attempt.
    /// Transport failures are retried with backoff.
    pub async fn decrypt(
        &self,
        ciphertext: &[u8],
        proof: &ProofTx,
        session: Arc<SessionKey>,
    ) -> Result<Bytes> {
        let object = EncryptedObject::from_bytes(ciphertext)?;
        let content_id = ContentId::for_bytes(ciphertext);
        self.decrypt_content(&content_id, object, proof, session)
            .await
    }

    /// Decrypt an already parsed object catalogued as `content_id`.
    pub async fn decrypt_content(
        &self,
        content_id: &ContentId,
        object: EncryptedObject,
        proof: &ProofTx,
        session: Arc<SessionKey>,
    ) -> Result<Bytes> {
        let engine = &self.decryption;
        let plaintext = retry::with_backoff(&self.config.retry, move || {
            engine.decrypt(content_id, object.clone(), proof, session.clone())
        })
        .await?;
        Ok(plaintext)
    }

    /// Everything needed to show `content_id` to `viewer`.
    ///
    /// The blob is downloaded before anything else, so a storage failure
    /// costs neither a wallet prompt nor a key-server round trip. A blob
    /// whose hash is not its id, or whose encryption disagrees with the
    /// record, is refused. Public
    /// content and plaintext fallbacks are returned without a session.
    /// Otherwise the viewer's creator capability (preferred) or active
    /// subscription is looked up on the ledger, a session is acquired
    /// through `signer`, and the object is decrypted. If the key servers
    /// reject the session as expired, it is signed again once.
    pub async fn view(
        &self,
        content_id: &ContentId,
        viewer: &Address,
        signer: &dyn Signer,
    ) -> Result<Bytes> {
        let record = self.catalog.require(content_id).await?;
        let blob = self.storage.get(&record.blob_id).await?;
        if BlobId::for_bytes(&blob) != record.blob_id {
            warn!(content = %content_id, blob = %record.blob_id, "blob does not match its id");
            return Err(GateError::Storage(format!(
                "blob {} does not match its id",
                record.blob_id
            )));
        }

        if record.policy == AccessPolicy::Public {
            debug!(content = %content_id, "public content");
            return Ok(blob);
        }

        let object = match (record.encrypted, EncryptedObject::from_bytes(&blob)?) {
            (false, EncryptedObject::Plaintext(plain)) => {
                warn!(content = %content_id, "gated content was stored unencrypted");
                return Ok(Bytes::from(plain.data));
            }
            (true, object @ EncryptedObject::Ciphertext(_)) => object,
            (encrypted, _) => {
                warn!(content = %content_id, encrypted, "stored object disagrees with its record");
                return Err(EnvelopeError::MalformedCiphertext(format!(
                    "record says encrypted={encrypted}, stored object says otherwise"
                ))
                .into());
            }
        };
        let namespace = *object.namespace();
        let resource_id = *object.resource_id();

        let proof = self.proof_for_viewer(&namespace, &resource_id, viewer).await?;
        let ttl = self.config.session_ttl_minutes;
        let mut session = self.sessions.acquire(*viewer, namespace, ttl, signer).await?;
        let mut signed_again = false;

        loop {
            match self
                .decrypt_content(content_id, object.clone(), &proof, session.clone())
                .await
            {
                Err(GateError::Envelope(EnvelopeError::SessionExpired)) if !signed_again => {
                    info!(content = %content_id, viewer = %viewer, "session rejected, signing again");
                    self.sessions.invalidate(&session).await;
                    session = self.sessions.acquire(*viewer, namespace, ttl, signer).await?;
                    signed_again = true;
                }
                outcome => return outcome,
            }
        }
    }

    /// Build the proof for the strongest authorization object `viewer` holds.
    async fn proof_for_viewer(
        &self,
        namespace: &Namespace,
        resource_id: &ResourceId,
        viewer: &Address,
    ) -> Result<ProofTx> {
        let builder = AuthorizationProofBuilder::new(*namespace);

        let caps = self.ledger.creator_caps(namespace, viewer, resource_id).await?;
        if let Some(cap) = caps.into_iter().next() {
            return Ok(builder.creator_proof(resource_id, cap));
        }

        let now = self.clock.now_millis();
        let subscriptions = self
            .ledger
            .subscriptions(namespace, viewer, resource_id, now)
            .await?;
        match subscriptions.into_iter().next() {
            Some(subscription) => Ok(builder.subscriber_proof(resource_id, subscription)),
            None => {
                debug!(viewer = %viewer, resource = %resource_id, "viewer holds no authorization object");
                Err(ProofError::MissingAuthorizationObject.into())
            }
        }
    }
}
