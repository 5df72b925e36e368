//! # Sigil Proof
//!
//! Authorization proofs: unsigned ledger transactions that call the
//! namespace's access policy with the caller's authorization object.
//! Key servers dry-run the call; if the policy approves, they release
//! their key share.
//!
//! Two policy paths exist and exactly one is used per attempt:
//!
//! - `approve_creator(id, cap)` for the creator holding an ownership cap
//! - `approve_subscriber(id, subscription, clock)` for subscribers

pub mod builder;
pub mod error;
pub mod ids;
pub mod tx;

pub use builder::AuthorizationProofBuilder;
pub use error::{ProofError, Result};
pub use ids::{AuthorizationId, CreatorCapId, SubscriptionId};
pub use tx::{
    CallArg, ClaimedAuthorization, PolicyCall, PolicyFunction, ProofClaim, ProofTx,
    POLICY_MODULE, PROOF_VERSION,
};
