//! Read-only ledger view used to evaluate access policies.
//!
//! Key servers dry-run a proof's policy call against the ledger; clients
//! query it to find which authorization objects a viewer holds before
//! building a proof.

use async_trait::async_trait;

use sigil_core::{Address, Namespace, ResourceId};
use sigil_proof::{CreatorCapId, ProofClaim, SubscriptionId};

use crate::error::Result;

/// Ledger queries and policy evaluation.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Creator capabilities `owner` holds for `resource`.
    async fn creator_caps(
        &self,
        namespace: &Namespace,
        owner: &Address,
        resource: &ResourceId,
    ) -> Result<Vec<CreatorCapId>>;

    /// Subscriptions `owner` holds for `resource` that are active at `now_ms`.
    async fn subscriptions(
        &self,
        namespace: &Namespace,
        owner: &Address,
        resource: &ResourceId,
        now_ms: i64,
    ) -> Result<Vec<SubscriptionId>>;

    /// Evaluate the policy call in `claim` as if `sender` executed it at
    /// `now_ms`. `Err(AccessDenied)` when the policy aborts.
    async fn approve(&self, sender: &Address, claim: &ProofClaim, now_ms: i64) -> Result<()>;
}

/// An in-memory ledger for tests and local development.
pub mod memory {
    use super::*;
    use rand::Rng;
    use std::collections::HashMap;
    use std::sync::RwLock;
    use tracing::debug;

    use sigil_core::ObjectId;
    use sigil_proof::ClaimedAuthorization;

    use crate::error::KeyServerError;

    #[derive(Debug, Clone)]
    struct CapRecord {
        namespace: Namespace,
        owner: Address,
        resource: ResourceId,
    }

    #[derive(Debug, Clone)]
    struct SubscriptionRecord {
        namespace: Namespace,
        owner: Address,
        resource: ResourceId,
        expires_at_ms: i64,
    }

    #[derive(Default)]
    struct LedgerState {
        caps: HashMap<ObjectId, CapRecord>,
        subscriptions: HashMap<ObjectId, SubscriptionRecord>,
    }

    /// Creator caps and subscriptions held in memory.
    #[derive(Default)]
    pub struct MemoryLedger {
        state: RwLock<LedgerState>,
    }

    fn random_object_id() -> ObjectId {
        ObjectId::from_bytes(rand::thread_rng().gen())
    }

    fn poisoned() -> KeyServerError {
        KeyServerError::Ledger("ledger lock poisoned".into())
    }

    impl MemoryLedger {
        pub fn new() -> Self {
            Self::default()
        }

        /// Mint a creator capability for `resource` owned by `owner`.
        pub fn mint_creator_cap(
            &self,
            namespace: Namespace,
            owner: Address,
            resource: ResourceId,
        ) -> Result<CreatorCapId> {
            let id = random_object_id();
            self.state.write().map_err(|_| poisoned())?.caps.insert(
                id,
                CapRecord {
                    namespace,
                    owner,
                    resource,
                },
            );
            Ok(CreatorCapId::new(id))
        }

        /// Record a subscription to `resource` valid until `expires_at_ms`.
        pub fn subscribe(
            &self,
            namespace: Namespace,
            owner: Address,
            resource: ResourceId,
            expires_at_ms: i64,
        ) -> Result<SubscriptionId> {
            let id = random_object_id();
            self.state
                .write()
                .map_err(|_| poisoned())?
                .subscriptions
                .insert(
                    id,
                    SubscriptionRecord {
                        namespace,
                        owner,
                        resource,
                        expires_at_ms,
                    },
                );
            Ok(SubscriptionId::new(id))
        }

        /// Move a subscription to a new owner.
        pub fn transfer_subscription(&self, id: &SubscriptionId, to: Address) -> Result<()> {
            let mut state = self.state.write().map_err(|_| poisoned())?;
            match state.subscriptions.get_mut(id.object_id()) {
                Some(record) => {
                    record.owner = to;
                    Ok(())
                }
                None => Err(KeyServerError::Ledger(format!("no subscription {id}"))),
            }
        }
    }

    #[async_trait]
    impl Ledger for MemoryLedger {
        async fn creator_caps(
            &self,
            namespace: &Namespace,
            owner: &Address,
            resource: &ResourceId,
        ) -> Result<Vec<CreatorCapId>> {
            let state = self.state.read().map_err(|_| poisoned())?;
            let mut caps: Vec<CreatorCapId> = state
                .caps
                .iter()
                .filter(|(_, cap)| {
                    &cap.namespace == namespace && &cap.owner == owner && &cap.resource == resource
                })
                .map(|(id, _)| CreatorCapId::new(*id))
                .collect();
            caps.sort();
            Ok(caps)
        }

        async fn subscriptions(
            &self,
            namespace: &Namespace,
            owner: &Address,
            resource: &ResourceId,
            now_ms: i64,
        ) -> Result<Vec<SubscriptionId>> {
            let state = self.state.read().map_err(|_| poisoned())?;
            let mut subs: Vec<SubscriptionId> = state
                .subscriptions
                .iter()
                .filter(|(_, sub)| {
                    &sub.namespace == namespace
                        && &sub.owner == owner
                        && &sub.resource == resource
                        && now_ms < sub.expires_at_ms
                })
                .map(|(id, _)| SubscriptionId::new(*id))
                .collect();
            subs.sort();
            Ok(subs)
        }

        async fn approve(&self, sender: &Address, claim: &ProofClaim, now_ms: i64) -> Result<()> {
            let state = self.state.read().map_err(|_| poisoned())?;
            let denied = |reason: &str| {
                debug!(%sender, reason, "policy rejected proof");
                Err(KeyServerError::AccessDenied(reason.to_string()))
            };

            match &claim.authorization {
                ClaimedAuthorization::Creator(cap) => {
                    let Some(record) = state.caps.get(cap.object_id()) else {
                        return denied("no such creator capability");
                    };
                    if record.namespace != claim.namespace || record.resource != claim.resource_id
                    {
                        return denied("capability is for another resource");
                    }
                    if &record.owner != sender {
                        return denied("capability is owned by another address");
                    }
                }
                ClaimedAuthorization::Subscriber {
                    subscription,
                    clock,
                } => {
                    if *clock != ObjectId::CLOCK {
                        return denied("clock argument is not the shared clock");
                    }
                    let Some(record) = state.subscriptions.get(subscription.object_id()) else {
                        return denied("no such subscription");
                    };
                    if record.namespace != claim.namespace || record.resource != claim.resource_id
                    {
                        return denied("subscription is for another resource");
                    }
                    if &record.owner != sender {
                        return denied("subscription is owned by another address");
                    }
                    if now_ms >= record.expires_at_ms {
                        return denied("subscription has expired");
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryLedger;
    use super::*;
    use crate::error::KeyServerError;
    use sigil_core::ObjectId;
    use sigil_proof::ProofTx;

    fn namespace() -> Namespace {
        Namespace::from_bytes([0x44; 32])
    }

    fn resource(b: u8) -> ResourceId {
        ResourceId::from_bytes([b; 32])
    }

    fn address(b: u8) -> Address {
        Address::from_bytes([b; 32])
    }

    #[tokio::test]
    async fn test_creator_cap_approves_owner_only() {
        let ledger = MemoryLedger::new();
        let cap = ledger
            .mint_creator_cap(namespace(), address(1), resource(9))
            .unwrap();
        let claim = ProofTx::approve_creator(namespace(), &resource(9), cap)
            .claim()
            .unwrap();

        assert!(ledger.approve(&address(1), &claim, 0).await.is_ok());
        assert!(matches!(
            ledger.approve(&address(2), &claim, 0).await,
            Err(KeyServerError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_cap_for_other_resource_denied() {
        let ledger = MemoryLedger::new();
        let cap = ledger
            .mint_creator_cap(namespace(), address(1), resource(9))
            .unwrap();
        let claim = ProofTx::approve_creator(namespace(), &resource(8), cap)
            .claim()
            .unwrap();

        assert!(ledger.approve(&address(1), &claim, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_subscription_expiry() {
        let ledger = MemoryLedger::new();
        let sub = ledger
            .subscribe(namespace(), address(1), resource(9), 1_000)
            .unwrap();
        let claim = ProofTx::approve_subscriber(namespace(), &resource(9), sub)
            .claim()
            .unwrap();

        assert!(ledger.approve(&address(1), &claim, 999).await.is_ok());
        assert!(ledger.approve(&address(1), &claim, 1_000).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_subscription_denied() {
        let ledger = MemoryLedger::new();
        let claim = ProofTx::approve_subscriber(
            namespace(),
            &resource(9),
            SubscriptionId::new(ObjectId::from_bytes([7; 32])),
        )
        .claim()
        .unwrap();

        assert!(matches!(
            ledger.approve(&address(1), &claim, 0).await,
            Err(KeyServerError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_queries_filter_by_owner_and_resource() {
        let ledger = MemoryLedger::new();
        let mine = ledger
            .subscribe(namespace(), address(1), resource(9), 5_000)
            .unwrap();
        ledger
            .subscribe(namespace(), address(2), resource(9), 5_000)
            .unwrap();
        ledger
            .subscribe(namespace(), address(1), resource(8), 5_000)
            .unwrap();

        let found = ledger
            .subscriptions(&namespace(), &address(1), &resource(9), 0)
            .await
            .unwrap();
        assert_eq!(found, vec![mine]);

        let expired = ledger
            .subscriptions(&namespace(), &address(1), &resource(9), 5_000)
            .await
            .unwrap();
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn test_transferred_subscription_follows_owner() {
        let ledger = MemoryLedger::new();
        let sub = ledger
            .subscribe(namespace(), address(1), resource(9), 5_000)
            .unwrap();
        ledger.transfer_subscription(&sub, address(2)).unwrap();

        let claim = ProofTx::approve_subscriber(namespace(), &resource(9), sub)
            .claim()
            .unwrap();
        assert!(ledger.approve(&address(1), &claim, 0).await.is_err());
        assert!(ledger.approve(&address(2), &claim, 0).await.is_ok());
    }
}
