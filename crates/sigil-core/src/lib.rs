//! # Sigil Core
//!
//! Pure primitives shared by every Sigil crate: identifiers, wallet and
//! session cryptography, and deterministic CBOR encoding.
//!
//! This crate contains no I/O and no networking.
//!
//! ## Key Types
//!
//! - [`Address`] - A wallet address, derived from the wallet's public key
//! - [`Namespace`] - The policy package that scopes resources and sessions
//! - [`ResourceId`] - Fixed-width hex identity that content is encrypted under
//! - [`ObjectId`] - Any on-chain object (capabilities, subscriptions, clock)
//! - [`Keypair`] / [`WalletSignature`] - Ed25519 signing for wallets and sessions
//! - [`EncryptionKey`] - ChaCha20-Poly1305 symmetric key
//!
//! ## Canonicalization
//!
//! Everything that gets signed or hashed is encoded with deterministic
//! CBOR. See the [`canonical`] module.

pub mod canonical;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod types;

pub use canonical::{encode_canonical, CanonicalMap};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{
    Blake3Hash, Ed25519PublicKey, Ed25519Signature, EncryptionKey, EncryptionNonce,
    EphemeralKeyPair, Keypair, SharedKey, SignatureScheme, WalletSignature, X25519PublicKey,
    X25519StaticSecret,
};
pub use error::{CoreError, Result};
pub use types::{Address, ContentId, Namespace, ObjectId, ResourceId};
