#![forbid(unsafe_code)]

//! Retry policies and the async retry-with-backoff helper.
//!
//! Only failures classified as [`ErrorCategory::Network`] are retried;
//! anything else is returned after the first attempt. Delays use fixed
//! formulas (no jitter) so paused-clock tests observe exact timings.
//!
//! ```
//! use pca_runtime::retry::{BackoffStrategy, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::linear(2, 2000);
//! assert_eq!(policy.delay(0), Duration::from_millis(2000));
//! assert_eq!(policy.delay(1), Duration::from_millis(4000));
//! assert_eq!(policy.total_attempts(), 3);
//! ```

use std::future::Future;

use pca_core::error::{Classify, ErrorCategory};
use tracing::{debug, warn};
use web_time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed { delay_ms: u64 },
    /// `base_ms * 2^attempt`, capped at `max_ms`.
    Exponential { base_ms: u64, max_ms: u64 },
    /// `base_ms * (attempt + 1)`, capped at `max_ms`.
    Linear { base_ms: u64, max_ms: u64 },
}

/// A retry policy with configurable attempts and backoff.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = run once).
    pub max_retries: u32,
    pub backoff: BackoffStrategy,
}

/// Retries once after two seconds.
impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(1, 2000)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Linearly growing delay, uncapped.
    pub fn linear(max_retries: u32, delay_ms: u64) -> Self {
        Self::new(
            max_retries,
            BackoffStrategy::Linear {
                base_ms: delay_ms,
                max_ms: u64::MAX,
            },
        )
    }

    pub fn no_retry() -> Self {
        Self::new(0, BackoffStrategy::Fixed { delay_ms: 0 })
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt + 1` (`attempt` is 0-indexed).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match &self.backoff {
            BackoffStrategy::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            BackoffStrategy::Exponential { base_ms, max_ms } => {
                let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                Duration::from_millis(base_ms.saturating_mul(multiplier).min(*max_ms))
            }
            BackoffStrategy::Linear { base_ms, max_ms } => {
                let delay = base_ms.saturating_mul(u64::from(attempt) + 1);
                Duration::from_millis(delay.min(*max_ms))
            }
        }
    }

    /// Sum of every retry delay.
    #[must_use]
    pub fn total_max_delay(&self) -> Duration {
        (0..self.max_retries).map(|i| self.delay(i)).sum()
    }
}

/// Run `operation`, retrying network failures according to `policy`.
///
/// Before each retry the helper sleeps for the policy delay and then calls
/// `on_retry(retry_number, total_attempts)` with `retry_number` starting at
/// 1. Non-network failures and the failure of the last attempt are
/// returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: impl FnMut(u32, u32),
) -> Result<T, E>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total = policy.total_attempts();
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let category = err.category();
        if category != ErrorCategory::Network {
            debug!(target: "pca.retry", category = category.as_str(), "not retryable");
            return Err(err);
        }
        if attempt >= policy.max_retries {
            warn!(target: "pca.retry", attempts = total, "retries exhausted");
            return Err(err);
        }
        let delay = policy.delay(attempt);
        debug!(
            target: "pca.retry",
            attempt = attempt + 1,
            total,
            delay_ms = delay.as_millis() as u64,
            "retrying after network failure"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
        on_retry(attempt, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_delays_grow_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.delay(0), Duration::from_millis(2000));
        assert_eq!(policy.delay(2), Duration::from_millis(6000));
        assert_eq!(policy.total_max_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn capped_strategies() {
        let exp = RetryPolicy::new(
            4,
            BackoffStrategy::Exponential {
                base_ms: 100,
                max_ms: 500,
            },
        );
        assert_eq!(exp.delay(0), Duration::from_millis(100));
        assert_eq!(exp.delay(2), Duration::from_millis(400));
        assert_eq!(exp.delay(3), Duration::from_millis(500));
        assert_eq!(exp.delay(80), Duration::from_millis(500));

        let lin = RetryPolicy::new(
            3,
            BackoffStrategy::Linear {
                base_ms: 100,
                max_ms: 250,
            },
        );
        assert_eq!(lin.delay(1), Duration::from_millis(200));
        assert_eq!(lin.delay(2), Duration::from_millis(250));
    }

    #[test]
    fn no_retry_runs_once() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.total_attempts(), 1);
        assert_eq!(policy.total_max_delay(), Duration::ZERO);
    }
}
