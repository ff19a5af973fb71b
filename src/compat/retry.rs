//! Bounded retry policy for remote fetches

use std::time::Duration;

use rand::Rng;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::warn;

use crate::compat::error::FetchError;
use crate::config::{
    RETRY_BASE_DELAY_MS, RETRY_JITTER_MS, RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_MS,
};

fn add_jitter(delay: Duration) -> Duration {
    delay + Duration::from_millis(rand::rng().random_range(0..=RETRY_JITTER_MS))
}

/// Run a fetch with bounded exponential backoff and jitter.
///
/// Only transient failures (network errors, rate limits, 5xx) are retried;
/// everything else fails on the first attempt. Delays start at
/// [`RETRY_BASE_DELAY_MS`], double per attempt, and are capped at
/// [`RETRY_MAX_DELAY_MS`] before jitter.
pub async fn fetch_with_backoff<T, F, Fut>(operation: &str, action: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    // from_millis(2) doubles the exponent each attempt; the factor scales the
    // first delay to RETRY_BASE_DELAY_MS.
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(RETRY_BASE_DELAY_MS / 2)
        .max_delay(Duration::from_millis(RETRY_MAX_DELAY_MS))
        .map(add_jitter)
        .take(RETRY_MAX_ATTEMPTS - 1);

    RetryIf::spawn(strategy, action, |err: &FetchError| {
        let transient = err.is_transient();
        if transient {
            warn!("Transient failure during {}, retrying: {}", operation, err);
        }
        transient
    })
    .await
}
