//! Retry policy for settlement calls
//!
//! Permanent rejections return after the attempt that produced them.
//! Transient failures are retried with linear backoff: after failed attempt
//! `n` the policy waits `base_delay * n`. At most `max_retries + 1` attempts
//! are made; the last error is returned when they run out.

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::{RetryClass, SettlementError};
use crate::settlement::SettlementResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

/// Result of a retried call plus how many attempts it took
#[derive(Debug)]
pub struct Retried<T> {
    pub result: SettlementResult<T>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before the attempt after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `call` until it succeeds, fails permanently or attempts run out.
    ///
    /// `call` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, op: &str, mut call: F) -> Retried<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = SettlementResult<T>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let err: SettlementError = match call(attempts).await {
                Ok(value) => {
                    return Retried {
                        result: Ok(value),
                        attempts,
                    }
                }
                Err(e) => e,
            };

            if err.retry_class() == RetryClass::Permanent {
                error!("{} rejected permanently on attempt {}: {}", op, attempts, err);
                return Retried {
                    result: Err(err),
                    attempts,
                };
            }

            if attempts >= self.max_attempts() {
                error!("{} failed after {} attempts: {}", op, attempts, err);
                return Retried {
                    result: Err(err),
                    attempts,
                };
            }

            let delay = self.delay_after(attempts);
            warn!(
                "{} attempt {} failed: {}. Retrying in {:?}",
                op, attempts, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
