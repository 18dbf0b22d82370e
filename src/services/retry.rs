// src/services/retry.rs
use crate::errors::StyleSenseError;
use log::warn;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fixed-delay retry for rate-limited upstream calls.
///
/// `max_attempts` counts every invocation, the first one included: the
/// default of 3 means one attempt plus two retries. Only `RateLimited`
/// failures are retried; anything else is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub async fn execute<T, F, Fut>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, StyleSenseError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StyleSenseError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(StyleSenseError::Cancelled);
            }

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_rate_limited() || attempt >= max_attempts {
                return Err(err);
            }

            warn!(
                "rate limited (attempt {}/{}), retrying in {}ms",
                attempt,
                max_attempts,
                self.base_delay.as_millis()
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(StyleSenseError::Cancelled),
                _ = tokio::time::sleep(self.base_delay) => {}
            }

            attempt += 1;
        }
    }
}
