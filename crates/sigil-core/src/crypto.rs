//! Cryptographic primitives for Sigil.
//!
//! Wraps Ed25519 signing (wallets and session keys), X25519 key agreement,
//! ChaCha20-Poly1305 authenticated encryption and Blake3 hashing with
//! strong types.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{CoreError, Result};
use crate::types::Address;

/// Intent prefix for personal messages, so a personal-message signature
/// can never be replayed as a transaction signature.
const PERSONAL_MESSAGE_INTENT: [u8; 3] = [3, 0, 0];

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

// serde only derives arrays up to 32 elements, so signatures go through
// a byte string.
impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SignatureVisitor;

        impl<'de> serde::de::Visitor<'de> for SignatureVisitor {
            type Value = Ed25519Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("64 signature bytes")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> std::result::Result<Self::Value, E> {
                let arr: [u8; 64] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(Ed25519Signature(arr))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut bytes = Vec::with_capacity(64);
                while let Some(b) = seq.next_element::<u8>()? {
                    bytes.push(b);
                }
                self.visit_bytes(&bytes)
            }
        }

        deserializer.deserialize_bytes(SignatureVisitor)
    }
}

/// A keypair for signing.
///
/// Wallets use it to sign personal messages; session keys use it to sign
/// key-server requests.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// The wallet address owned by this keypair.
    pub fn address(&self) -> Address {
        Address::from_public_key(SignatureScheme::Ed25519, &self.public_key())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a personal message the way a wallet does.
    pub fn sign_personal_message(&self, message: &[u8]) -> WalletSignature {
        WalletSignature {
            scheme: SignatureScheme::Ed25519,
            signature: self.sign(&personal_message_digest(message)),
            public_key: self.public_key(),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

fn personal_message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&PERSONAL_MESSAGE_INTENT);
    hasher.update(message);
    *hasher.finalize().as_bytes()
}

/// Signature schemes a wallet may sign with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureScheme {
    Ed25519 = 0x00,
}

impl SignatureScheme {
    /// The one-byte flag that prefixes serialized signatures.
    pub const fn flag(self) -> u8 {
        self as u8
    }

    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            0x00 => Ok(Self::Ed25519),
            other => Err(CoreError::UnsupportedScheme(other)),
        }
    }
}

/// A wallet signature over a personal message.
///
/// Serialized as `flag || signature || public key` (97 bytes). The public
/// key is carried so verifiers can recover the signer and check it against
/// the claimed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSignature {
    pub scheme: SignatureScheme,
    pub signature: Ed25519Signature,
    pub public_key: Ed25519PublicKey,
}

impl WalletSignature {
    /// Serialized length in bytes.
    pub const LENGTH: usize = 1 + 64 + 32;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LENGTH);
        buf.push(self.scheme.flag());
        buf.extend_from_slice(&self.signature.0);
        buf.extend_from_slice(&self.public_key.0);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LENGTH {
            return Err(CoreError::Decoding(format!(
                "wallet signature must be {} bytes, got {}",
                Self::LENGTH,
                bytes.len()
            )));
        }
        let scheme = SignatureScheme::from_flag(bytes[0])?;
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[1..65]);
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&bytes[65..]);
        Ok(Self {
            scheme,
            signature: Ed25519Signature(signature),
            public_key: Ed25519PublicKey(public_key),
        })
    }

    /// The address that produced this signature.
    pub fn signer(&self) -> Address {
        Address::from_public_key(self.scheme, &self.public_key)
    }

    /// Check that `address` signed `message` as a personal message.
    pub fn verify_personal_message(&self, address: &Address, message: &[u8]) -> Result<()> {
        if &self.signer() != address {
            return Err(CoreError::AddressMismatch);
        }
        self.public_key
            .verify(&personal_message_digest(message), &self.signature)
    }
}

/// An X25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// An X25519 static secret key, held by key servers.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    /// Create from seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> SharedKey {
        let shared = self.0.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

/// Ephemeral key pair for one-time key agreement.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new ephemeral key pair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Consumes the ephemeral secret (can only be used once).
    pub fn diffie_hellman(self, peer_public: &X25519PublicKey) -> SharedKey {
        let shared = self.secret.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

/// A shared secret derived from X25519 key agreement.
#[derive(Clone)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Derive a wrapping key bound to `context`.
    pub fn derive_encryption_key(&self, context: &[u8]) -> EncryptionKey {
        let mut hasher = blake3::Hasher::new_derive_key("sigil-v1-key-wrap");
        hasher.update(&self.0);
        hasher.update(context);
        EncryptionKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit symmetric encryption key for ChaCha20-Poly1305.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::Decryption(format!("invalid key length: expected 32, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt `plaintext`, authenticating `aad` alongside it.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Encryption(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(&nonce.0), Payload { msg: plaintext, aad })
            .map_err(|e| CoreError::Encryption(e.to_string()))
    }

    /// Decrypt `ciphertext`; fails if it or `aad` were tampered with.
    pub fn decrypt(&self, ciphertext: &[u8], aad: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Decryption(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce.0), Payload { msg: ciphertext, aad })
            .map_err(|e| CoreError::Decryption(e.to_string()))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"hello world");

        keypair
            .public_key()
            .verify(b"hello world", &signature)
            .expect("valid signature should verify");
        assert!(keypair.public_key().verify(b"hello worlD", &signature).is_err());
    }

    #[test]
    fn test_personal_message_roundtrip() {
        let wallet = Keypair::from_seed(&[0x42; 32]);
        let sig = wallet.sign_personal_message(b"unlock");

        let bytes = sig.to_bytes();
        assert_eq!(bytes.len(), WalletSignature::LENGTH);
        let recovered = WalletSignature::from_bytes(&bytes).unwrap();

        recovered
            .verify_personal_message(&wallet.address(), b"unlock")
            .unwrap();
    }

    #[test]
    fn test_personal_message_wrong_address() {
        let wallet = Keypair::from_seed(&[0x42; 32]);
        let other = Keypair::from_seed(&[0x43; 32]);
        let sig = wallet.sign_personal_message(b"unlock");

        assert_eq!(
            sig.verify_personal_message(&other.address(), b"unlock"),
            Err(CoreError::AddressMismatch)
        );
        assert_eq!(
            sig.verify_personal_message(&wallet.address(), b"other"),
            Err(CoreError::InvalidSignature)
        );
    }

    #[test]
    fn test_personal_message_is_not_raw_signature() {
        let wallet = Keypair::generate();
        let raw = wallet.sign(b"unlock");
        let forged = WalletSignature {
            scheme: SignatureScheme::Ed25519,
            signature: raw,
            public_key: wallet.public_key(),
        };
        assert!(forged
            .verify_personal_message(&wallet.address(), b"unlock")
            .is_err());
    }

    #[test]
    fn test_ephemeral_key_agreement() {
        let server = X25519StaticSecret::generate();
        let client = EphemeralKeyPair::generate();
        let client_public = client.public_key();

        let a = client.diffie_hellman(&server.public_key());
        let b = server.diffie_hellman(&client_public);
        assert_eq!(
            a.derive_encryption_key(b"ctx").as_bytes(),
            b.derive_encryption_key(b"ctx").as_bytes()
        );
    }

    #[test]
    fn test_aad_is_authenticated() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();
        let ct = key.encrypt(b"secret", b"meta", &nonce).unwrap();

        assert_eq!(key.decrypt(&ct, b"meta", &nonce).unwrap(), b"secret");
        assert!(key.decrypt(&ct, b"tampered", &nonce).is_err());
    }

    #[test]
    fn test_key_derivation_different_contexts() {
        let shared = SharedKey([0x42; 32]);
        let k1 = shared.derive_encryption_key(b"context-a");
        let k2 = shared.derive_encryption_key(b"context-b");
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let mut bytes = Keypair::generate().sign_personal_message(b"x").to_bytes();
        bytes[0] = 0x09;
        assert_eq!(
            WalletSignature::from_bytes(&bytes),
            Err(CoreError::UnsupportedScheme(0x09))
        );
    }
}
