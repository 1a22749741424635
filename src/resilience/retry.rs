//! Bounded retry for transient ledger failures.
//!
//! Only failures the ledger classified as transient are retried, always with
//! the same payload. Permanent failures and exhausted budgets surface to the
//! caller, which aborts the session.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::ledger::LedgerError;

use super::backoff::calculate_backoff;

/// Retry budget for one logical ledger call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before re-attempting after the given failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(*self, attempt)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Drive `operation` until it succeeds, fails permanently, or the attempt
/// budget runs out.
pub async fn retry_transient<T, F, Fut>(
    policy: RetryPolicy,
    op_name: &'static str,
    mut operation: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    op = op_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient ledger failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, base_delay_ms: 1, max_delay_ms: 2 }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = retry_transient(fast_policy(3), "initialize", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LedgerError::Transient("nonce too low".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(fast_policy(5), "initialize", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LedgerError::Permanent("reverted".into())) }
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Permanent(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_surfaces_last_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(fast_policy(3), "accept", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LedgerError::Transient("connection refused".into())) }
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Transient(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
