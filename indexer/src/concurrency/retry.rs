use std::future::Future;

use config::shared::RetryConfig;
use tracing::debug;

use crate::error::IndexResult;

/// Runs `operation` until it succeeds or `retry.max_attempts` attempts have failed.
///
/// Waits [`RetryConfig::delay_after`] between attempts and returns the last error.
pub async fn retry_with_backoff<T, F, Fut>(retry: &RetryConfig, mut operation: F) -> IndexResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = IndexResult<T>>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                let delay = retry.delay_after(attempt);
                debug!(attempt, ?delay, error = %err, "retrying index store operation");

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
