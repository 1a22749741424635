//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use super::retry::RetryPolicy;

/// Delay before re-attempting after `attempt` failed tries.
///
/// Doubles from the policy's base up to its cap, plus up to 10% random
/// jitter.
pub fn calculate_backoff(policy: RetryPolicy, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    // Clamp the doubling count well below u64 overflow; the cap wins long
    // before that anyway.
    let doublings = attempt.saturating_sub(1).min(16);
    let delay_ms = policy
        .base_delay_ms
        .saturating_mul(1u64 << doublings)
        .min(policy.max_delay_ms);

    let jitter_ms = if delay_ms >= 10 {
        rand::thread_rng().gen_range(0..delay_ms / 10)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_delay_ms: u64, max_delay_ms: u64) -> RetryPolicy {
        RetryPolicy { max_attempts: 3, base_delay_ms, max_delay_ms }
    }

    #[test]
    fn delay_grows_exponentially() {
        let b1 = calculate_backoff(policy(100, 2000), 1);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(policy(100, 2000), 2);
        assert!(b2.as_millis() >= 200);
    }

    #[test]
    fn delay_is_capped_at_max() {
        let max = calculate_backoff(policy(100, 1000), 10);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() <= 1100);
    }

    #[test]
    fn attempt_zero_has_no_delay() {
        assert_eq!(calculate_backoff(policy(100, 1000), 0), Duration::ZERO);
    }
}
