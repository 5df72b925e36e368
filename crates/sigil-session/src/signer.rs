//! Wallet signing seam.

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

use sigil_core::{Address, WalletSignature};

/// Why a wallet did not produce a signature.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The user dismissed the prompt.
    #[error("user declined to sign")]
    Declined,

    /// The wallet itself failed.
    #[error("wallet error: {0}")]
    Wallet(#[from] anyhow::Error),
}

/// Something that can ask a wallet to sign a personal message.
///
/// Implementations may take a long time (a human is involved).
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign_personal_message(
        &self,
        address: &Address,
        message: &[u8],
    ) -> Result<WalletSignature, SigningError>;
}

/// A [`Signer`] backed by an async closure over the message bytes.
pub struct FnSigner<F> {
    sign: F,
}

/// Wrap an async closure as a [`Signer`].
pub fn signer_fn<F, Fut>(sign: F) -> FnSigner<F>
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<WalletSignature, SigningError>> + Send,
{
    FnSigner { sign }
}

#[async_trait]
impl<F, Fut> Signer for FnSigner<F>
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<WalletSignature, SigningError>> + Send,
{
    async fn sign_personal_message(
        &self,
        _address: &Address,
        message: &[u8],
    ) -> Result<WalletSignature, SigningError> {
        (self.sign)(message.to_vec()).await
    }
}

#[async_trait]
impl<S: Signer + ?Sized> Signer for std::sync::Arc<S> {
    async fn sign_personal_message(
        &self,
        address: &Address,
        message: &[u8],
    ) -> Result<WalletSignature, SigningError> {
        (**self).sign_personal_message(address, message).await
    }
}
