//! Exponential backoff retry, applied only to kinds the taxonomy marks
//! retryable (spec.md §7 "Retry policy").

use std::future::Future;
use std::time::Duration;

use crate::error::ComplianceError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }
}

/// Retries `f` while `ErrorKind::is_retryable()` and attempts remain. The
/// final error (whatever kind) is returned unmodified if retries are
/// exhausted or the kind isn't retryable to begin with.
pub async fn retry_with_backoff<F, Fut, T>(policy: RetryPolicy, mut f: F) -> Result<T, ComplianceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ComplianceError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.kind.is_retryable();
                if !retryable || attempt + 1 >= policy.max_attempts {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
        }
    }
}
