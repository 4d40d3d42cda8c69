use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use treatmap_common::error::is_retryable_status;
use treatmap_common::{HttpReply, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms.max(initial_backoff_ms)),
        }
    }

    /// Delay before retry number `attempt` (0-based): initial · 2^attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Retry an HTTP call with exponential backoff.
    ///
    /// Retries replies with status 429/500/502/503/504 and transient transport
    /// errors. When retries run out, the last reply is returned as-is (the caller
    /// decides what a bad status means) and the last transport error is returned
    /// as an error.
    pub async fn retry<F, Fut>(&self, operation_name: &str, mut f: F) -> Result<HttpReply>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpReply>>,
    {
        let mut attempt = 0;

        loop {
            let outcome = f().await;

            let reason = match &outcome {
                Ok(reply) if is_retryable_status(reply.status) => format!("HTTP {}", reply.status),
                Err(e) if e.is_transient() => e.to_string(),
                _ => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return outcome;
                }
            };

            if attempt >= self.max_retries {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %reason,
                    "Operation failed after max retries"
                );
                return outcome;
            }

            let backoff = self.backoff(attempt);
            warn!(
                operation = operation_name,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                error = %reason,
                "Operation failed, retrying"
            );

            sleep(backoff).await;
            attempt += 1;
        }
    }
}
