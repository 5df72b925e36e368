//! Key-server abstraction.
//!
//! A key server holds one long-lived X25519 secret. It releases its share
//! of a content key only after checking the caller's session certificate,
//! the request signature, and that the proof's policy call approves the
//! caller on the ledger.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{KeyServerError, Result};
use crate::messages::{FetchKeyRequest, FetchKeyResponse, KeyServerId, KeyServerInfo};

/// A member of the threshold decryption network.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait KeyServer: Send + Sync {
    /// The server's id, known without a round trip.
    fn id(&self) -> KeyServerId;

    /// Fetch the server's public keys and proof of possession.
    async fn info(&self) -> Result<KeyServerInfo>;

    /// Ask for this server's share of a content key.
    async fn fetch_key(&self, request: &FetchKeyRequest) -> Result<FetchKeyResponse>;
}

/// The configured set of key servers.
#[derive(Clone, Default)]
pub struct KeyServerSet {
    servers: Vec<Arc<dyn KeyServer>>,
}

impl KeyServerSet {
    pub fn new(servers: Vec<Arc<dyn KeyServer>>) -> Self {
        Self { servers }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn get(&self, id: &KeyServerId) -> Option<Arc<dyn KeyServer>> {
        self.servers.iter().find(|s| &s.id() == id).cloned()
    }

    /// Fetch every server's info concurrently.
    ///
    /// Servers that fail, time out, or (with `verify`) fail their proof of
    /// possession are left out and logged.
    pub async fn discover(&self, timeout: Duration, verify: bool) -> Vec<KeyServerInfo> {
        let lookups = self.servers.iter().map(|server| async move {
            let id = server.id();
            match tokio::time::timeout(timeout, server.info()).await {
                Err(_) => Err(KeyServerError::Unavailable(format!("{id}: timed out"))),
                Ok(Err(e)) => Err(e),
                Ok(Ok(info)) if info.id != id => Err(KeyServerError::UnverifiedServer(info.name)),
                Ok(Ok(info)) if verify => info.verify().map(|()| info),
                Ok(Ok(info)) => Ok(info),
            }
        });

        let mut found = Vec::new();
        for result in join_all(lookups).await {
            match result {
                Ok(info) => found.push(info),
                Err(e) => warn!(error = %e, "excluding key server"),
            }
        }
        debug!(reachable = found.len(), configured = self.servers.len(), "key servers discovered");
        found
    }
}

/// An in-memory key server for tests and local development.
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use sigil_core::{Clock, Keypair, X25519StaticSecret};
    use sigil_proof::ProofTx;

    use crate::ledger::Ledger;
    use crate::share::{identity, ShareLeg, WrappedShare};

    /// A key server that evaluates policies against a [`Ledger`].
    pub struct MemoryKeyServer {
        name: String,
        signing: Keypair,
        secret: X25519StaticSecret,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
        online: AtomicBool,
        forged_possession: AtomicBool,
        latency: Mutex<Duration>,
        fetches: AtomicUsize,
    }

    impl MemoryKeyServer {
        pub fn new(name: impl Into<String>, ledger: Arc<dyn Ledger>, clock: Arc<dyn Clock>) -> Self {
            Self {
                name: name.into(),
                signing: Keypair::generate(),
                secret: X25519StaticSecret::generate(),
                ledger,
                clock,
                online: AtomicBool::new(true),
                forged_possession: AtomicBool::new(false),
                latency: Mutex::new(Duration::ZERO),
                fetches: AtomicUsize::new(0),
            }
        }

        pub fn name(&self) -> &str {
            &self.name
        }

        /// Take the server off the network, or bring it back.
        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        /// Delay every answer by `latency`.
        pub fn set_latency(&self, latency: Duration) {
            if let Ok(mut current) = self.latency.lock() {
                *current = latency;
            }
        }

        /// Advertise a proof of possession that does not verify.
        pub fn forge_possession(&self) {
            self.forged_possession.store(true, Ordering::SeqCst);
        }

        /// Number of `fetch_key` calls received.
        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        async fn simulate_network(&self) -> Result<()> {
            let latency = self.latency.lock().map(|l| *l).unwrap_or_default();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if !self.online.load(Ordering::SeqCst) {
                return Err(KeyServerError::Unavailable(format!("{} is offline", self.name)));
            }
            Ok(())
        }

        async fn check(&self, request: &FetchKeyRequest) -> Result<Vec<u8>> {
            let certificate = &request.certificate;
            certificate
                .verify_signature()
                .map_err(|e| KeyServerError::InvalidCertificate(e.to_string()))?;
            let now = self.clock.now_millis();
            if now >= certificate.expires_at_ms() {
                return Err(KeyServerError::SessionExpired);
            }
            if certificate.namespace != request.namespace {
                return Err(KeyServerError::InvalidCertificate(
                    "certificate is for another namespace".into(),
                ));
            }
            request.verify_signature()?;

            let claim = ProofTx::from_bytes(&request.proof)
                .and_then(|tx| tx.claim())
                .map_err(|e| KeyServerError::InvalidProof(e.to_string()))?;
            if claim.namespace != request.namespace {
                return Err(KeyServerError::InvalidProof(
                    "proof calls another namespace".into(),
                ));
            }
            if claim.resource_id != request.resource_id {
                return Err(KeyServerError::InvalidProof(
                    "proof is for another identity".into(),
                ));
            }

            self.ledger.approve(&certificate.address, &claim, now).await?;

            request.share.open(
                &self.secret,
                ShareLeg::ToServer,
                &identity(&request.namespace, &request.resource_id),
            )
        }
    }

    #[async_trait]
    impl KeyServer for MemoryKeyServer {
        fn id(&self) -> KeyServerId {
            KeyServerId::for_verifying_key(&self.signing.public_key())
        }

        async fn info(&self) -> Result<KeyServerInfo> {
            self.simulate_network().await?;
            let mut info = KeyServerInfo::new(&self.name, &self.signing, self.secret.public_key());
            if self.forged_possession.load(Ordering::SeqCst) {
                info.encryption_key = X25519StaticSecret::generate().public_key();
            }
            Ok(info)
        }

        async fn fetch_key(&self, request: &FetchKeyRequest) -> Result<FetchKeyResponse> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.simulate_network().await?;

            let share = match self.check(request).await {
                Ok(share) => share,
                Err(e) => {
                    debug!(server = %self.name, error = %e, "refusing key request");
                    return Err(e);
                }
            };

            let sealed = WrappedShare::seal(
                &share,
                &request.response_key,
                ShareLeg::ToClient,
                &identity(&request.namespace, &request.resource_id),
            )?;
            debug!(server = %self.name, resource = %request.resource_id, "released key share");
            Ok(FetchKeyResponse {
                server: self.id(),
                share: sealed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryKeyServer;
    use super::*;
    use crate::ledger::memory::MemoryLedger;
    use crate::share::{identity, ShareLeg, WrappedShare};
    use sigil_core::{Keypair, ManualClock, Namespace, ResourceId, X25519StaticSecret};
    use sigil_proof::ProofTx;
    use sigil_session::{PendingSession, SessionKey};

    struct Fixture {
        clock: ManualClock,
        ledger: Arc<MemoryLedger>,
        server: Arc<MemoryKeyServer>,
        namespace: Namespace,
        resource: ResourceId,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(1_700_000_000_000);
        let ledger = Arc::new(MemoryLedger::new());
        let server = Arc::new(MemoryKeyServer::new(
            "ks-0",
            ledger.clone(),
            Arc::new(clock.clone()),
        ));
        Fixture {
            clock,
            ledger,
            server,
            namespace: Namespace::from_bytes([0x51; 32]),
            resource: ResourceId::from_bytes([0x52; 32]),
        }
    }

    fn session(f: &Fixture, wallet: &Keypair) -> SessionKey {
        let pending = PendingSession::new(wallet.address(), f.namespace, 10, &f.clock).unwrap();
        let signature = wallet.sign_personal_message(&pending.personal_message());
        pending.activate(signature).unwrap()
    }

    async fn request(
        f: &Fixture,
        session: &SessionKey,
        proof: &ProofTx,
        response: &X25519StaticSecret,
    ) -> FetchKeyRequest {
        let info = f.server.info().await.unwrap();
        let share = WrappedShare::seal(
            b"the share",
            &info.encryption_key,
            ShareLeg::ToServer,
            &identity(&f.namespace, &f.resource),
        )
        .unwrap();
        FetchKeyRequest::new(
            session,
            proof.to_bytes().unwrap(),
            f.namespace,
            f.resource,
            share,
            response.public_key(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_releases_share_to_subscriber() {
        let f = fixture();
        let wallet = Keypair::generate();
        let sub = f
            .ledger
            .subscribe(f.namespace, wallet.address(), f.resource, i64::MAX)
            .unwrap();
        let proof = ProofTx::approve_subscriber(f.namespace, &f.resource, sub);
        let response_key = X25519StaticSecret::generate();

        let session = session(&f, &wallet);
        let req = request(&f, &session, &proof, &response_key).await;
        let resp = f.server.fetch_key(&req).await.unwrap();

        let share = resp
            .share
            .open(
                &response_key,
                ShareLeg::ToClient,
                &identity(&f.namespace, &f.resource),
            )
            .unwrap();
        assert_eq!(share, b"the share");
        assert_eq!(resp.server, f.server.id());
    }

    #[tokio::test]
    async fn test_denies_without_subscription() {
        let f = fixture();
        let owner = Keypair::generate();
        let stranger = Keypair::generate();
        let sub = f
            .ledger
            .subscribe(f.namespace, owner.address(), f.resource, i64::MAX)
            .unwrap();
        let proof = ProofTx::approve_subscriber(f.namespace, &f.resource, sub);

        let session = session(&f, &stranger);
        let req = request(&f, &session, &proof, &X25519StaticSecret::generate()).await;
        assert!(matches!(
            f.server.fetch_key(&req).await,
            Err(KeyServerError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_expired_session() {
        let f = fixture();
        let wallet = Keypair::generate();
        let cap = f
            .ledger
            .mint_creator_cap(f.namespace, wallet.address(), f.resource)
            .unwrap();
        let proof = ProofTx::approve_creator(f.namespace, &f.resource, cap);

        let session = session(&f, &wallet);
        let req = request(&f, &session, &proof, &X25519StaticSecret::generate()).await;
        f.clock.advance(Duration::from_secs(11 * 60));

        assert_eq!(
            f.server.fetch_key(&req).await.unwrap_err(),
            KeyServerError::SessionExpired
        );
    }

    #[tokio::test]
    async fn test_rejects_tampered_request() {
        let f = fixture();
        let wallet = Keypair::generate();
        let cap = f
            .ledger
            .mint_creator_cap(f.namespace, wallet.address(), f.resource)
            .unwrap();
        let proof = ProofTx::approve_creator(f.namespace, &f.resource, cap);

        let session = session(&f, &wallet);
        let mut req = request(&f, &session, &proof, &X25519StaticSecret::generate()).await;
        req.response_key = X25519StaticSecret::generate().public_key();

        assert!(matches!(
            f.server.fetch_key(&req).await,
            Err(KeyServerError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_proof_for_other_resource() {
        let f = fixture();
        let wallet = Keypair::generate();
        let other = ResourceId::from_bytes([0x99; 32]);
        let cap = f
            .ledger
            .mint_creator_cap(f.namespace, wallet.address(), other)
            .unwrap();
        let proof = ProofTx::approve_creator(f.namespace, &other, cap);

        let session = session(&f, &wallet);
        let req = request(&f, &session, &proof, &X25519StaticSecret::generate()).await;
        assert!(matches!(
            f.server.fetch_key(&req).await,
            Err(KeyServerError::InvalidProof(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_server_is_unavailable() {
        let f = fixture();
        f.server.set_online(false);
        assert!(matches!(
            f.server.info().await,
            Err(KeyServerError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_discover_excludes_unverified_and_offline() {
        let f = fixture();
        let clock: Arc<dyn sigil_core::Clock> = Arc::new(f.clock.clone());
        let forged = Arc::new(MemoryKeyServer::new("ks-1", f.ledger.clone(), clock.clone()));
        forged.forge_possession();
        let offline = Arc::new(MemoryKeyServer::new("ks-2", f.ledger.clone(), clock));
        offline.set_online(false);

        let set = KeyServerSet::new(vec![f.server.clone(), forged.clone(), offline]);

        let verified = set.discover(Duration::from_secs(1), true).await;
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].id, f.server.id());

        let unverified = set.discover(Duration::from_secs(1), false).await;
        assert_eq!(unverified.len(), 2);
        assert!(set.get(&forged.id()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_times_out_slow_servers() {
        let f = fixture();
        f.server.set_latency(Duration::from_secs(30));
        let set = KeyServerSet::new(vec![f.server.clone()]);
        assert!(set.discover(Duration::from_secs(1), true).await.is_empty());
    }
}
