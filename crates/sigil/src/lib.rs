//! # Sigil
//!
//! Access control for encrypted creator content.
//!
//! ## Overview
//!
//! Content is encrypted at upload under a resource id with a threshold of
//! key servers, stored on a content-addressed network, and decrypted only
//! for viewers who can prove, through a ledger policy call, that they hold
//! the creator's capability or an active subscription for that resource.
//!
//! ## Key Concepts
//!
//! - **Session key**: a short-lived credential activated by one wallet
//!   signature, cached per wallet and namespace.
//! - **Proof**: an unsigned ledger transaction calling `approve_creator` or
//!   `approve_subscriber`. Key servers dry-run it.
//! - **Plaintext fallback**: uploads never fail for lack of key servers;
//!   they are stored in the clear and flagged as such.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sigil::{AccessPolicy, Collaborators, ContentMetadata, Gate, GateConfig};
//! use sigil::core::{ContentId, Keypair, Namespace, ResourceId};
//! use sigil::keyserver::{KeyServerSet, MemoryLedger};
//! use sigil::session::signer_fn;
//!
//! async fn example(servers: KeyServerSet, namespace: Namespace, resource: ResourceId) {
//!     let ledger = Arc::new(MemoryLedger::new());
//!     let gate = Gate::new(
//!         namespace,
//!         GateConfig::default(),
//!         Collaborators::in_memory(servers, ledger),
//!     )
//!     .unwrap();
//!
//!     let id = ContentId::new("episode-1").unwrap();
//!     gate.publish(
//!         id.clone(),
//!         b"...",
//!         resource,
//!         AccessPolicy::SubscriberGated,
//!         ContentMetadata::new("episode-1.mp4", "video/mp4", 0),
//!     )
//!     .await
//!     .unwrap();
//!
//!     let wallet = Keypair::generate();
//!     let viewer = wallet.address();
//!     let signer = signer_fn(move |message: Vec<u8>| {
//!         let wallet = wallet.clone();
//!         async move { Ok(wallet.sign_personal_message(&message)) }
//!     });
//!     match gate.view(&id, &viewer, &signer).await {
//!         Ok(bytes) => println!("{} bytes", bytes.len()),
//!         Err(e) => println!("{}", e.user_message()),
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sigil::core` - Identifiers, crypto and canonical encoding
//! - `sigil::session` - Session keys and the wallet signer
//! - `sigil::proof` - Authorization proofs
//! - `sigil::keyserver` - Key-server protocol and the in-memory network
//! - `sigil::envelope` - Threshold encryption and decryption
//! - `sigil::catalog` - Content records and blob storage

pub mod config;
pub mod error;
pub mod gate;
pub mod retry;

pub use sigil_catalog as catalog;
pub use sigil_core as core;
pub use sigil_envelope as envelope;
pub use sigil_keyserver as keyserver;
pub use sigil_proof as proof;
pub use sigil_session as session;

pub use config::{GateConfig, RetryPolicy};
pub use error::{GateError, Result};
pub use gate::{Collaborators, Gate};

pub use sigil_catalog::{AccessPolicy, BlobId, ContentRecord};
pub use sigil_core::{Address, ContentId, Namespace, ResourceId};
pub use sigil_envelope::{ContentMetadata, EncryptedObject, EnvelopeError};
pub use sigil_proof::ProofTx;
pub use sigil_session::{SessionKey, Signer, SigningError};
