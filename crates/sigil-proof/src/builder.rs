//! Builds proof transactions for one policy namespace.

use tracing::debug;

use sigil_core::{Namespace, ResourceId};

use crate::error::{ProofError, Result};
use crate::ids::{CreatorCapId, SubscriptionId};
use crate::tx::ProofTx;

/// Builds `access_policy` approval transactions for a namespace.
///
/// Every call produces a fresh transaction; nothing is cached.
#[derive(Debug, Clone)]
pub struct AuthorizationProofBuilder {
    namespace: Namespace,
}

impl AuthorizationProofBuilder {
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Prove ownership of the creator capability `cap_id` (`cap_0x...`).
    pub fn build_creator_proof(&self, resource: &ResourceId, cap_id: &str) -> Result<ProofTx> {
        let cap = CreatorCapId::parse(cap_id)?;
        Ok(self.creator_proof(resource, cap))
    }

    /// Prove an active subscription `subscription_id` (`sub_0x...`).
    pub fn build_subscriber_proof(
        &self,
        resource: &ResourceId,
        subscription_id: &str,
    ) -> Result<ProofTx> {
        let subscription = SubscriptionId::parse(subscription_id)?;
        Ok(self.subscriber_proof(resource, subscription))
    }

    pub fn creator_proof(&self, resource: &ResourceId, cap: CreatorCapId) -> ProofTx {
        debug!(%resource, %cap, "building creator proof");
        ProofTx::approve_creator(self.namespace, resource, cap)
    }

    pub fn subscriber_proof(&self, resource: &ResourceId, subscription: SubscriptionId) -> ProofTx {
        debug!(%resource, %subscription, "building subscriber proof");
        ProofTx::approve_subscriber(self.namespace, resource, subscription)
    }

    /// Pick the policy path for a viewer.
    ///
    /// A creator capability wins over a subscription when both are known;
    /// with neither, there is nothing to prove.
    pub fn build_for_viewer(
        &self,
        resource: &ResourceId,
        creator_cap: Option<&str>,
        subscription: Option<&str>,
    ) -> Result<ProofTx> {
        fn present(id: Option<&str>) -> Option<&str> {
            id.filter(|s| !s.trim().is_empty())
        }

        match (present(creator_cap), present(subscription)) {
            (Some(cap), _) => self.build_creator_proof(resource, cap),
            (None, Some(sub)) => self.build_subscriber_proof(resource, sub),
            (None, None) => Err(ProofError::MissingAuthorizationObject),
        }
    }
}
