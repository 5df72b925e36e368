//! Test wallets and signers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use sigil_core::{Address, Keypair, WalletSignature};
use sigil_session::{Signer, SigningError};

/// An Ed25519 wallet that signs every request.
#[derive(Debug, Clone)]
pub struct TestWallet {
    keypair: Keypair,
}

impl TestWallet {
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
        }
    }

    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn sign(&self, message: &[u8]) -> WalletSignature {
        self.keypair.sign_personal_message(message)
    }
}

impl Default for TestWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Signer for TestWallet {
    async fn sign_personal_message(
        &self,
        _address: &Address,
        message: &[u8],
    ) -> Result<WalletSignature, SigningError> {
        Ok(self.sign(message))
    }
}

/// How a [`CountingSigner`] answers.
#[derive(Debug, Clone)]
pub enum SignerMode {
    /// Sign with the wallet.
    Sign,
    /// The user dismisses the prompt.
    Decline,
    /// The wallet reports an internal failure.
    Fail,
    /// Never answer.
    Stall,
    /// Sign with a different wallet.
    Impostor(Keypair),
}

/// A signer that counts prompts and answers according to its mode.
pub struct CountingSigner {
    wallet: TestWallet,
    mode: Mutex<SignerMode>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl CountingSigner {
    pub fn new(wallet: TestWallet) -> Self {
        Self {
            wallet,
            mode: Mutex::new(SignerMode::Sign),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_mode(self, mode: SignerMode) -> Self {
        self.set_mode(mode);
        self
    }

    /// Wait `delay` before answering, as a human would.
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut current) = self.delay.lock() {
            *current = delay;
        }
        self
    }

    pub fn set_mode(&self, mode: SignerMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }

    pub fn wallet(&self) -> &TestWallet {
        &self.wallet
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Number of prompts shown so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for CountingSigner {
    async fn sign_personal_message(
        &self,
        _address: &Address,
        message: &[u8],
    ) -> Result<WalletSignature, SigningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay.lock().map(|d| *d).unwrap_or_default();
        let mode = self
            .mode
            .lock()
            .map(|m| m.clone())
            .unwrap_or(SignerMode::Fail);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match mode {
            SignerMode::Sign => Ok(self.wallet.sign(message)),
            SignerMode::Decline => Err(SigningError::Declined),
            SignerMode::Fail => Err(anyhow::anyhow!("wallet disconnected").into()),
            SignerMode::Stall => std::future::pending().await,
            SignerMode::Impostor(other) => Ok(other.sign_personal_message(message)),
        }
    }
}
