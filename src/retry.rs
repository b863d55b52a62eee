//! Retry executor with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::{RequestError, Result, RetryPolicy};

/// Backoff delay before jitter for the retry following `attempt` (0-indexed).
///
/// Exponential policies double the base delay per attempt up to
/// `max_delay`; fixed policies always wait `base_delay`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    if !policy.exponential() {
        return policy.base_delay();
    }

    let multiplier = 1u32 << attempt.min(31);
    policy
        .base_delay()
        .saturating_mul(multiplier)
        .min(policy.max_delay())
}

/// Adds up to 10% random jitter to `delay`.
fn with_jitter(delay: Duration) -> Duration {
    let factor = 1.0 + rand::thread_rng().gen_range(0.0..0.1);
    delay.mul_f64(factor)
}

/// Whether `err` may be retried under `policy`.
///
/// Errors without a status code are treated as transient.
pub fn is_retryable(err: &RequestError, policy: &RetryPolicy) -> bool {
    match err {
        RequestError::Http { status, .. } => policy.is_retryable_status(*status),
        RequestError::Timeout { .. } | RequestError::Network(_) | RequestError::Decode(_) => true,
        RequestError::Authorization(_)
        | RequestError::InvalidHeader(_)
        | RequestError::InvalidPolicy(_) => false,
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_retries() + 1` attempts have been made.
///
/// The last error is returned unchanged.
pub async fn execute_with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= policy.max_retries() || !is_retryable(&err, policy) {
            return Err(err);
        }

        let delay = with_jitter(backoff_delay(policy, attempt));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt = attempt + 1,
            max_retries = policy.max_retries(),
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying request"
        );

        sleep(delay).await;
        attempt += 1;
    }
}
