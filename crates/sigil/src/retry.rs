//! Retrying key-server work that failed for transport reasons.

use std::future::Future;
use tracing::warn;

use sigil_envelope::EnvelopeError;

use crate::config::RetryPolicy;

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` attempts have been made.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, EnvelopeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EnvelopeError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let backoff = policy.backoff(attempt);
                warn!(attempt = attempt + 1, error = %e, "key servers unavailable, retrying in {backoff:?}");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_network_failures_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = with_backoff(&policy(3), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(EnvelopeError::NetworkUnavailable("down".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(250 + 500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(&policy(2), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EnvelopeError::NetworkUnavailable("down".into()))
        })
        .await;

        assert!(matches!(result, Err(EnvelopeError::NetworkUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_surface_immediately() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(&policy(5), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EnvelopeError::AccessDenied("no".into()))
        })
        .await;

        assert!(matches!(result, Err(EnvelopeError::AccessDenied(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
