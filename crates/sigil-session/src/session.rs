//! Pending and activated session keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use sigil_core::{
    Address, Clock, CoreError, Ed25519PublicKey, Ed25519Signature, Keypair, Namespace,
    WalletSignature,
};

use crate::error::{Result, SessionError};

/// Shortest accepted session lifetime.
pub const MIN_TTL_MINUTES: u32 = 1;

/// Longest accepted session lifetime.
pub const MAX_TTL_MINUTES: u32 = 60;

pub(crate) fn check_ttl(ttl_minutes: u32) -> Result<()> {
    if !(MIN_TTL_MINUTES..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
        return Err(SessionError::InvalidTtl {
            got: ttl_minutes,
            min: MIN_TTL_MINUTES,
            max: MAX_TTL_MINUTES,
        });
    }
    Ok(())
}

/// The text a wallet is asked to sign.
///
/// Binds the namespace, lifetime, creation time and the session's own
/// verifying key, so a signature can only activate this exact session.
fn challenge(
    namespace: &Namespace,
    ttl_minutes: u32,
    created_at_ms: i64,
    session_key: &Ed25519PublicKey,
) -> Vec<u8> {
    format!(
        "Accessing keys of namespace {} for {} mins from {}, session key {}",
        namespace,
        ttl_minutes,
        created_at_ms,
        session_key.to_hex()
    )
    .into_bytes()
}

/// A session key that has not been signed yet.
///
/// Only [`PendingSession::activate`] turns it into something usable.
pub struct PendingSession {
    address: Address,
    namespace: Namespace,
    created_at_ms: i64,
    ttl_minutes: u32,
    keypair: Keypair,
}

impl PendingSession {
    /// Create a session scoped to `(address, namespace)` that lives for
    /// `ttl_minutes` from now.
    pub fn new(
        address: Address,
        namespace: Namespace,
        ttl_minutes: u32,
        clock: &dyn Clock,
    ) -> Result<Self> {
        check_ttl(ttl_minutes)?;
        Ok(Self {
            address,
            namespace,
            created_at_ms: clock.now_millis(),
            ttl_minutes,
            keypair: Keypair::generate(),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The personal message the wallet must sign.
    pub fn personal_message(&self) -> Vec<u8> {
        challenge(
            &self.namespace,
            self.ttl_minutes,
            self.created_at_ms,
            &self.keypair.public_key(),
        )
    }

    /// Attach the wallet's signature.
    ///
    /// Fails with [`SessionError::SigningRejected`] if the signature does
    /// not verify for this session's address and challenge.
    pub fn activate(self, signature: WalletSignature) -> Result<SessionKey> {
        signature
            .verify_personal_message(&self.address, &self.personal_message())
            .map_err(|e| match e {
                CoreError::AddressMismatch => SessionError::SigningRejected(
                    "signature was produced by a different address".into(),
                ),
                other => SessionError::SigningRejected(other.to_string()),
            })?;

        Ok(SessionKey {
            address: self.address,
            namespace: self.namespace,
            created_at_ms: self.created_at_ms,
            ttl_minutes: self.ttl_minutes,
            keypair: self.keypair,
            signature,
        })
    }
}

impl fmt::Debug for PendingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSession")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// An activated session key.
///
/// Immutable once created. Valid until `created_at + ttl`; after that the
/// key servers refuse its certificate and a new one must be signed.
pub struct SessionKey {
    address: Address,
    namespace: Namespace,
    created_at_ms: i64,
    ttl_minutes: u32,
    keypair: Keypair,
    signature: WalletSignature,
}

impl SessionKey {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn ttl_minutes(&self) -> u32 {
        self.ttl_minutes
    }

    pub fn expires_at_ms(&self) -> i64 {
        self.created_at_ms + i64::from(self.ttl_minutes) * 60_000
    }

    /// True once `now_ms` has reached the expiry instant.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.is_expired_at(clock.now_millis())
    }

    /// The ephemeral key requests are signed with.
    pub fn session_public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Sign a request payload with the session's ephemeral key.
    pub fn sign_request(&self, payload: &[u8]) -> Ed25519Signature {
        self.keypair.sign(payload)
    }

    /// The wallet-signed certificate presented to key servers.
    pub fn certificate(&self) -> Certificate {
        Certificate {
            address: self.address,
            namespace: self.namespace,
            session_key: self.keypair.public_key(),
            created_at_ms: self.created_at_ms,
            ttl_minutes: self.ttl_minutes,
            signature: self.signature,
        }
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("session_key", &self.keypair.public_key())
            .field("expires_at_ms", &self.expires_at_ms())
            .finish()
    }
}

/// Public half of a session: what the wallet signed, and the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub address: Address,
    pub namespace: Namespace,
    pub session_key: Ed25519PublicKey,
    pub created_at_ms: i64,
    pub ttl_minutes: u32,
    pub signature: WalletSignature,
}

impl Certificate {
    pub fn expires_at_ms(&self) -> i64 {
        self.created_at_ms + i64::from(self.ttl_minutes) * 60_000
    }

    /// The message the wallet signed.
    pub fn personal_message(&self) -> Vec<u8> {
        challenge(
            &self.namespace,
            self.ttl_minutes,
            self.created_at_ms,
            &self.session_key,
        )
    }

    /// Check the wallet signature and the lifetime bounds.
    ///
    /// Expiry is checked separately by [`Certificate::expires_at_ms`] so
    /// servers can report it distinctly.
    pub fn verify_signature(&self) -> std::result::Result<(), CoreError> {
        if check_ttl(self.ttl_minutes).is_err() {
            return Err(CoreError::Decoding(format!(
                "certificate ttl {} out of range",
                self.ttl_minutes
            )));
        }
        self.signature
            .verify_personal_message(&self.address, &self.personal_message())
    }
}
