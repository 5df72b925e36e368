//! # Sigil Session
//!
//! Short-lived, signature-activated credentials that authenticate a wallet
//! to the key servers without a wallet prompt on every decryption.
//!
//! ## Lifecycle
//!
//! 1. [`PendingSession::new`] creates an ephemeral Ed25519 keypair scoped to
//!    `(address, namespace, ttl)` and exposes the challenge message.
//! 2. The wallet signs the challenge as a personal message.
//! 3. [`PendingSession::activate`] verifies that signature and yields a
//!    [`SessionKey`]. A pending session can reach no other API.
//!
//! [`SessionKeyManager`] drives this with a caller-supplied [`Signer`] and
//! caches one key per `(address, namespace)`, so the wallet is prompted
//! once per cache miss no matter how many callers ask concurrently.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sigil_core::{Keypair, Namespace, SystemClock};
//! use sigil_session::{signer_fn, SessionKeyManager};
//!
//! async fn example(namespace: Namespace) {
//!     let wallet = Keypair::generate();
//!     let manager = SessionKeyManager::new(Arc::new(SystemClock), Default::default());
//!
//!     let address = wallet.address();
//!     let signer = signer_fn(move |message: Vec<u8>| {
//!         let wallet = wallet.clone();
//!         async move { Ok(wallet.sign_personal_message(&message)) }
//!     });
//!
//!     let session = manager.acquire(address, namespace, 10, &signer).await.unwrap();
//!     assert_eq!(session.address(), &address);
//! }
//! ```

pub mod error;
pub mod manager;
pub mod session;
pub mod signer;

pub use error::{Result, SessionError};
pub use manager::{SessionConfig, SessionKeyManager, SessionScope};
pub use session::{
    Certificate, PendingSession, SessionKey, MAX_TTL_MINUTES, MIN_TTL_MINUTES,
};
pub use signer::{signer_fn, FnSigner, Signer, SigningError};
