//! An in-process threshold network.

use std::sync::Arc;
use std::time::Duration;

use sigil_core::{Clock, ManualClock, Namespace, ResourceId};
use sigil_keyserver::{KeyServer, KeyServerSet, MemoryKeyServer, MemoryLedger};
use sigil_proof::{CreatorCapId, SubscriptionId};
use sigil_session::{PendingSession, SessionKey};

use crate::wallet::TestWallet;

/// Start of every fixture clock: 2023-11-14T22:13:20Z.
pub const EPOCH_MS: i64 = 1_700_000_000_000;

/// N key servers sharing one ledger and one manual clock.
pub struct Network {
    pub clock: ManualClock,
    pub ledger: Arc<MemoryLedger>,
    pub servers: Vec<Arc<MemoryKeyServer>>,
    pub namespace: Namespace,
}

impl Network {
    pub fn new(servers: usize) -> Self {
        Self::with_namespace(servers, Namespace::from_bytes([0x5e; 32]))
    }

    pub fn with_namespace(servers: usize, namespace: Namespace) -> Self {
        let clock = ManualClock::new(EPOCH_MS);
        let ledger = Arc::new(MemoryLedger::new());
        let servers = (0..servers)
            .map(|i| {
                Arc::new(MemoryKeyServer::new(
                    format!("key-server-{i}"),
                    ledger.clone(),
                    Arc::new(clock.clone()),
                ))
            })
            .collect();
        Self {
            clock,
            ledger,
            servers,
            namespace,
        }
    }

    /// The servers as a client-side set.
    pub fn key_servers(&self) -> KeyServerSet {
        KeyServerSet::new(
            self.servers
                .iter()
                .map(|s| s.clone() as Arc<dyn KeyServer>)
                .collect(),
        )
    }

    /// The shared clock as a trait object.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    /// A resource id with every byte set to `byte`.
    pub fn resource(&self, byte: u8) -> ResourceId {
        ResourceId::from_bytes([byte; 32])
    }

    pub fn mint_cap(&self, owner: &TestWallet, resource: ResourceId) -> CreatorCapId {
        self.ledger
            .mint_creator_cap(self.namespace, owner.address(), resource)
            .expect("ledger lock")
    }

    /// Subscribe `owner` to `resource` for `lasting` from now.
    pub fn subscribe(
        &self,
        owner: &TestWallet,
        resource: ResourceId,
        lasting: Duration,
    ) -> SubscriptionId {
        let expires = self.clock.now_millis() + lasting.as_millis() as i64;
        self.ledger
            .subscribe(self.namespace, owner.address(), resource, expires)
            .expect("ledger lock")
    }

    /// An activated session for `wallet` signed without any manager.
    pub fn session(&self, wallet: &TestWallet, ttl_minutes: u32) -> Arc<SessionKey> {
        let pending = PendingSession::new(wallet.address(), self.namespace, ttl_minutes, &self.clock)
            .expect("valid ttl");
        let signature = wallet.sign(&pending.personal_message());
        Arc::new(pending.activate(signature).expect("own signature"))
    }

    /// Total `fetch_key` calls across all servers.
    pub fn fetches(&self) -> usize {
        self.servers.iter().map(|s| s.fetch_count()).sum()
    }

    pub fn set_online(&self, online: bool) {
        for server in &self.servers {
            server.set_online(online);
        }
    }

    pub fn set_latency(&self, latency: Duration) {
        for server in &self.servers {
            server.set_latency(latency);
        }
    }
}
