//! # Sigil Envelope
//!
//! Threshold encryption of creator content.
//!
//! ## Upload
//!
//! [`EncryptionEngine::encrypt`] generates a fresh data key, encrypts the
//! payload with ChaCha20-Poly1305, splits the key with Shamir's scheme and
//! seals one share to each usable key server. The result is an
//! [`EncryptedObject`]; when encryption is disabled or too few servers
//! answer, it is a tagged [`PlaintextObject`] instead of an error.
//!
//! ## View
//!
//! [`DecryptionEngine::decrypt`] checks the object, session and proof
//! locally, then asks the servers for their shares. Once `threshold`
//! shares are open the data key is recovered and the payload decrypted.
//! Concurrent calls for the same content and viewer share one attempt.
//!
//! ## Stored form
//!
//! See [`object`] for the byte layout. Objects start with [`MAGIC`].

pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod object;
pub mod threshold;

pub use decrypt::DecryptionEngine;
pub use encrypt::{EncryptionEngine, EnvelopeConfig};
pub use error::{EnvelopeError, Result};
pub use object::{
    ContentMetadata, EncryptedObject, PlaintextObject, Scheme, SealedObject, ServerShare, MAGIC,
    OBJECT_VERSION,
};
