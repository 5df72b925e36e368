//! Process-wide session key cache.
//!
//! One [`SessionKey`] is kept per `(address, namespace)`. Acquisition is
//! single-flight per scope: while one caller is waiting on the wallet,
//! every other caller for the same scope waits on that same prompt and
//! receives its outcome, success or failure.
//!
//! A caller that gives up (its future is dropped) while prompting leaves
//! nothing behind, and the next caller prompts afresh.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sigil_core::{Address, Clock, Namespace};

use crate::error::{Result, SessionError};
use crate::session::{check_ttl, PendingSession, SessionKey};
use crate::signer::{Signer, SigningError};

/// Cache key: the wallet and the policy namespace a session is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionScope {
    pub address: Address,
    pub namespace: Namespace,
}

/// Session manager settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for the wallet before giving up.
    pub signing_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signing_timeout: Duration::from_secs(180),
        }
    }
}

#[derive(Default)]
struct SlotState {
    key: Option<Arc<SessionKey>>,
    /// Most recent failed prompt and the attempt number it ended.
    last_failure: Option<(u64, SessionError)>,
}

#[derive(Default)]
struct Slot {
    /// Number of prompts that ran to completion for this scope.
    completed: AtomicU64,
    /// Bumped whenever the scope is forgotten.
    forgotten: AtomicU64,
    state: Mutex<SlotState>,
}

impl Slot {
    /// Drop the cached key. A prompt still running keeps the slot locked;
    /// the bump tells it not to cache what it gets.
    fn forget(&self) {
        self.forgotten.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut state) = self.state.try_lock() {
            state.key = None;
            state.last_failure = None;
        }
    }
}

/// Caches and creates session keys.
pub struct SessionKeyManager {
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    slots: Mutex<HashMap<SessionScope, Arc<Slot>>>,
}

impl SessionKeyManager {
    pub fn new(clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        Self {
            clock,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    async fn slot(&self, scope: SessionScope) -> Arc<Slot> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(scope).or_default())
    }

    /// Return the cached, unexpired session for `(address, namespace)`, or
    /// prompt the wallet through `signer` for a new one.
    ///
    /// A cached key is returned as is even when `ttl_minutes` differs from
    /// the lifetime it was created with.
    pub async fn acquire(
        &self,
        address: Address,
        namespace: Namespace,
        ttl_minutes: u32,
        signer: &dyn Signer,
    ) -> Result<Arc<SessionKey>> {
        check_ttl(ttl_minutes)?;

        let scope = SessionScope { address, namespace };
        let slot = self.slot(scope).await;

        // Read before queueing: any prompt that completes after this point
        // is one we were waiting on.
        let seen = slot.completed.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let Some(key) = &state.key {
            if !key.is_expired(self.clock.as_ref()) {
                debug!(%address, "session cache hit");
                return Ok(Arc::clone(key));
            }
            debug!(%address, "cached session expired");
            state.key = None;
        }

        if let Some((attempt, error)) = &state.last_failure {
            if *attempt > seen {
                debug!(%address, "sharing outcome of concurrent prompt");
                return Err(error.clone());
            }
        }

        let generation = slot.forgotten.load(Ordering::Acquire);
        let outcome = self.prompt(address, namespace, ttl_minutes, signer).await;
        let attempt = slot.completed.fetch_add(1, Ordering::AcqRel) + 1;

        match outcome {
            Ok(key) => {
                let key = Arc::new(key);
                state.last_failure = None;
                if slot.forgotten.load(Ordering::Acquire) == generation {
                    state.key = Some(Arc::clone(&key));
                } else {
                    debug!(%address, "scope forgotten while prompting, not caching");
                }
                info!(%address, expires_at_ms = key.expires_at_ms(), "session key activated");
                Ok(key)
            }
            Err(error) => {
                state.last_failure = Some((attempt, error.clone()));
                Err(error)
            }
        }
    }

    async fn prompt(
        &self,
        address: Address,
        namespace: Namespace,
        ttl_minutes: u32,
        signer: &dyn Signer,
    ) -> Result<SessionKey> {
        let pending = PendingSession::new(address, namespace, ttl_minutes, self.clock.as_ref())?;
        let message = pending.personal_message();

        debug!(%address, ttl_minutes, "requesting wallet signature");
        let signed = tokio::time::timeout(
            self.config.signing_timeout,
            signer.sign_personal_message(&address, &message),
        )
        .await;

        let signature = match signed {
            Err(_) => {
                warn!(%address, "wallet did not sign in time");
                return Err(SessionError::SigningTimeout {
                    waited_ms: self.config.signing_timeout.as_millis() as u64,
                });
            }
            Ok(Err(SigningError::Declined)) => {
                warn!(%address, "wallet declined to sign");
                return Err(SessionError::SigningRejected("user declined".into()));
            }
            Ok(Err(SigningError::Wallet(e))) => {
                warn!(%address, error = %e, "wallet failed to sign");
                return Err(SessionError::SigningRejected(e.to_string()));
            }
            Ok(Ok(signature)) => signature,
        };

        let key = pending.activate(signature)?;
        if key.is_expired(self.clock.as_ref()) {
            let waited_ms = self
                .clock
                .now_millis()
                .saturating_sub(key.created_at_ms())
                .max(0) as u64;
            warn!(%address, waited_ms, "session expired while the wallet was signing");
            return Err(SessionError::SigningTimeout { waited_ms });
        }
        Ok(key)
    }

    /// The cached session for a scope, if present, unexpired, and not in
    /// the middle of being replaced.
    pub async fn cached(&self, address: &Address, namespace: &Namespace) -> Option<Arc<SessionKey>> {
        let slot = {
            let slots = self.slots.lock().await;
            Arc::clone(slots.get(&SessionScope {
                address: *address,
                namespace: *namespace,
            })?)
        };
        let state = slot.state.try_lock().ok()?;
        let key = state
            .key
            .as_ref()
            .filter(|key| !key.is_expired(self.clock.as_ref()))
            .cloned();
        key
    }

    /// Drop `key` from the cache if it is still the cached session.
    ///
    /// A key that has already been replaced is left alone, so a late
    /// rejection cannot evict a fresh session.
    pub async fn invalidate(&self, key: &SessionKey) {
        let slot = {
            let slots = self.slots.lock().await;
            match slots.get(&SessionScope {
                address: *key.address(),
                namespace: *key.namespace(),
            }) {
                Some(slot) => Arc::clone(slot),
                None => return,
            }
        };
        let mut state = slot.state.lock().await;
        let same = state
            .key
            .as_ref()
            .is_some_and(|cached| cached.session_public_key() == key.session_public_key());
        if same {
            debug!(address = %key.address(), "session invalidated");
            state.key = None;
        }
    }

    /// Forget every session not owned by `address` (or all of them when
    /// the wallet disconnects).
    ///
    /// Slots stay in place so that a prompt already running for a
    /// forgotten scope is still the one later callers wait on.
    pub async fn retain_address(&self, address: Option<&Address>) {
        let slots = self.slots.lock().await;
        for (scope, slot) in slots.iter() {
            if Some(&scope.address) != address {
                slot.forget();
            }
        }
    }

    /// Forget every session.
    pub async fn clear(&self) {
        for slot in self.slots.lock().await.values() {
            slot.forget();
        }
    }
}
