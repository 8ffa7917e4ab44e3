use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::constants::gasless::{BASE_DELAY_MS, MAX_ATTEMPTS, MAX_JITTER_MS};
use crate::errors::{Error, Result};

/// Exponential backoff with additive jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_jitter: Duration::from_millis(MAX_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt `n` (1-based), without jitter
    pub fn base_delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        self.base_delay_for(failed_attempt) + jitter
    }
}

/// Run `attempt_fn` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts. Exhaustion wraps the last error with the operation context.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut attempt_fn: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!("{} attempt {}/{}", operation, attempt, max_attempts);
        let error = match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() {
            debug!("{} failed with non-retryable error: {}", operation, error);
            return Err(error);
        }

        if attempt >= max_attempts {
            warn!("{} failed after {} attempt(s): {}", operation, attempt, error);
            return Err(Error::RetriesExhausted {
                operation: operation.to_string(),
                attempts: attempt,
                elapsed: started.elapsed(),
                source: Box::new(error),
            });
        }

        let delay = policy.delay_for(attempt);
        debug!(
            "{} attempt {} failed ({}), retrying in {}ms",
            operation,
            attempt,
            error,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
