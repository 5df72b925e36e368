//! Threshold decryption.
//!
//! One attempt per `(content id, viewer)` is in flight at a time. Callers
//! that arrive while an attempt is running await the same shared future
//! and receive the same result. The shared future only lives as long as
//! someone awaits it: when every caller has gone, the attempt and its
//! outstanding key-server calls are dropped.

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use sigil_core::{Address, Clock, ContentId, X25519StaticSecret};
use sigil_keyserver::{
    identity, FetchKeyRequest, KeyServerError, KeyServerSet, ShareLeg,
};
use sigil_proof::ProofTx;
use sigil_session::SessionKey;

use crate::error::{EnvelopeError, Result};
use crate::object::{EncryptedObject, SealedObject};
use crate::threshold;

type Attempt = Shared<BoxFuture<'static, Result<Bytes>>>;
type AttemptKey = (ContentId, Address);

/// Decrypts threshold ciphertext through the key servers.
pub struct DecryptionEngine {
    servers: KeyServerSet,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    in_flight: Mutex<HashMap<AttemptKey, WeakShared<BoxFuture<'static, Result<Bytes>>>>>,
}

impl DecryptionEngine {
    pub fn new(servers: KeyServerSet, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            servers,
            clock,
            timeout,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Decrypt `object` with `proof`, authenticated by `session`.
    ///
    /// Local checks run first and never touch the network: the object must
    /// be threshold ciphertext, the session unexpired, and the proof and
    /// session must target the object's namespace and resource.
    pub async fn decrypt(
        &self,
        content_id: &ContentId,
        object: EncryptedObject,
        proof: &ProofTx,
        session: Arc<SessionKey>,
    ) -> Result<Bytes> {
        let sealed = match object {
            EncryptedObject::Ciphertext(sealed) => sealed,
            EncryptedObject::Plaintext(_) => {
                return Err(EnvelopeError::MalformedCiphertext(
                    "object is not threshold ciphertext".into(),
                ))
            }
        };
        self.check_locally(&sealed, proof, &session)?;

        let key = (content_id.clone(), *session.address());
        let attempt = self.join_or_start(key.clone(), sealed, proof, session)?;
        let result = attempt.await;
        self.forget_finished(&key);
        result
    }

    fn check_locally(&self, sealed: &SealedObject, proof: &ProofTx, session: &SessionKey) -> Result<()> {
        if sealed.threshold == 0 || usize::from(sealed.threshold) > sealed.shares.len() {
            return Err(EnvelopeError::MalformedCiphertext(format!(
                "threshold {} with {} shares",
                sealed.threshold,
                sealed.shares.len()
            )));
        }
        if session.is_expired(self.clock.as_ref()) {
            return Err(EnvelopeError::SessionExpired);
        }
        if session.namespace() != &sealed.namespace {
            return Err(EnvelopeError::InvalidProof(
                "session is for another namespace".into(),
            ));
        }
        let claim = proof
            .claim()
            .map_err(|e| EnvelopeError::InvalidProof(e.to_string()))?;
        if claim.namespace != sealed.namespace {
            return Err(EnvelopeError::InvalidProof(
                "proof calls another namespace".into(),
            ));
        }
        if claim.resource_id != sealed.resource_id {
            return Err(EnvelopeError::InvalidProof(
                "proof is for another resource".into(),
            ));
        }
        Ok(())
    }

    fn join_or_start(
        &self,
        key: AttemptKey,
        sealed: SealedObject,
        proof: &ProofTx,
        session: Arc<SessionKey>,
    ) -> Result<Attempt> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| EnvelopeError::NetworkUnavailable("decryption state poisoned".into()))?;
        // Attempts whose every caller gave up.
        in_flight.retain(|_, weak| weak.upgrade().is_some());

        if let Some(running) = in_flight.get(&key).and_then(WeakShared::upgrade) {
            if running.peek().is_none() {
                debug!(content = %key.0, "joining in-flight decryption");
                return Ok(running);
            }
        }

        let proof = proof
            .to_bytes()
            .map_err(|e| EnvelopeError::InvalidProof(e.to_string()))?;
        let attempt = fetch_and_open(
            self.servers.clone(),
            self.timeout,
            sealed,
            proof,
            session,
        )
        .boxed()
        .shared();
        if let Some(weak) = attempt.downgrade() {
            in_flight.insert(key, weak);
        }
        Ok(attempt)
    }

    fn forget_finished(&self, key: &AttemptKey) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        let finished = match in_flight.get(key).and_then(WeakShared::upgrade) {
            Some(running) => running.peek().is_some(),
            None => true,
        };
        if finished {
            in_flight.remove(key);
        }
    }

    /// Number of attempts currently tracked.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }
}

/// Ask every server named in the object for its share, stopping once
/// `threshold` shares have been opened.
async fn fetch_and_open(
    servers: KeyServerSet,
    timeout: Duration,
    sealed: SealedObject,
    proof: Vec<u8>,
    session: Arc<SessionKey>,
) -> Result<Bytes> {
    let id = identity(&sealed.namespace, &sealed.resource_id);
    let response_key = X25519StaticSecret::generate();
    let response_public = response_key.public_key();
    let threshold = usize::from(sealed.threshold);

    let mut requests: FuturesUnordered<_> = sealed
        .shares
        .iter()
        .map(|entry| {
            let server = servers.get(&entry.server);
            let request = FetchKeyRequest::new(
                &session,
                proof.clone(),
                sealed.namespace,
                sealed.resource_id,
                entry.share.clone(),
                response_public,
            );
            let server_id = entry.server;
            async move {
                let server = server.ok_or_else(|| {
                    KeyServerError::Unavailable(format!("{server_id} is not configured"))
                })?;
                let request = request?;
                match tokio::time::timeout(timeout, server.fetch_key(&request)).await {
                    Ok(response) => response,
                    Err(_) => Err(KeyServerError::Unavailable(format!("{server_id} timed out"))),
                }
            }
        })
        .collect();

    let mut shares = Vec::with_capacity(threshold);
    let mut failures: Vec<EnvelopeError> = Vec::new();
    while let Some(outcome) = requests.next().await {
        match outcome.and_then(|response| response.share.open(&response_key, ShareLeg::ToClient, &id)) {
            Ok(share) => {
                shares.push(share);
                if shares.len() >= threshold {
                    break;
                }
            }
            Err(e) => {
                warn!(resource = %sealed.resource_id, error = %e, "key server refused share");
                failures.push(e.into());
            }
        }
    }
    drop(requests);

    if shares.len() < threshold {
        let error = failures
            .into_iter()
            .max_by_key(EnvelopeError::precedence)
            .unwrap_or_else(|| EnvelopeError::NetworkUnavailable("no key server answered".into()));
        debug!(
            resource = %sealed.resource_id,
            received = shares.len(),
            threshold,
            error = %error,
            "threshold not met"
        );
        return Err(error);
    }

    let key = threshold::combine(sealed.threshold, &shares)?;
    let plaintext = key
        .decrypt(&sealed.ciphertext, &sealed.aad()?, &sealed.nonce)
        .map_err(|_| EnvelopeError::MalformedCiphertext("ciphertext failed authentication".into()))?;
    debug!(resource = %sealed.resource_id, bytes = plaintext.len(), "content decrypted");
    Ok(Bytes::from(plaintext))
}
