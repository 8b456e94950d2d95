//! Bounded exponential-backoff retry for fragment I/O.

use quire_core::config::RetryConfig;
use quire_storage::{StoreError, StoreResult};
use std::future::Future;
use tracing::debug;

/// The last error of a retried operation and how many attempts were made.
#[derive(Debug)]
pub(crate) struct Exhausted {
    pub source: StoreError,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with a non-transient error, or
/// `policy.max_retries` retries have been spent.
pub(crate) async fn with_retry<T, F, Fut>(policy: &RetryConfig, mut op: F) -> Result<T, Exhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt <= policy.max_retries => {
                let delay = policy.backoff(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "transient store error, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(source) => {
                return Err(Exhausted {
                    source,
                    attempts: attempt,
                });
            }
        }
    }
}
