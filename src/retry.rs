//! Retry policy for mutating calls against the ACL service.
//!
//! The service rejects writes while an instance is locked by another event.
//! Those failures are retried with exponential backoff and jitter until the
//! operation's time window elapses; any other failure ends the loop at once.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{AclError, Result};

/// Classifies an error as worth another attempt
pub type TransientPredicate = fn(&AclError) -> bool;

/// Bounded retry policy for one lifecycle operation
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total time allowed for all attempts
    pub timeout: Duration,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Cap for exponential growth
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 for doubling)
    pub backoff_multiplier: f64,
    /// Which errors are retried
    pub is_transient: TransientPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            is_transient: AclError::is_event_locked,
        }
    }
}

impl RetryPolicy {
    /// Default policy with a different time window
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout, ..Default::default() }
    }

    /// Calculate the backoff duration for a given attempt number (0-indexed).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let multiplier = self.backoff_multiplier.powi(attempt as i32 - 1);
        let backoff_ms = self.initial_backoff.as_millis() as f64 * multiplier;
        let capped_ms = backoff_ms.min(self.max_backoff.as_millis() as f64);

        Duration::from_millis(capped_ms as u64)
    }

    /// Backoff with up to 25% jitter so concurrent callers do not retry in lockstep
    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let backoff = self.backoff_for_attempt(attempt);
        let jitter_range = backoff.as_millis() as u64 / 4;
        if jitter_range == 0 {
            return backoff;
        }
        backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_range))
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// the time window elapses, or `cancel` fires.
    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        let timeout_ms = self.timeout.as_millis() as u64;
        let mut attempt: u32 = 0;
        let mut last_error: Option<String> = None;
        let mut final_attempt = false;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AclError::cancelled(operation_name)),
                result = tokio::time::timeout_at(deadline, operation()) => result,
            };

            let error = match outcome {
                Ok(Ok(value)) => {
                    if attempt > 0 {
                        debug!(operation = operation_name, attempts = attempt + 1, "Succeeded after retrying");
                    }
                    return Ok(value);
                }
                Ok(Err(error)) => error,
                Err(_) => {
                    let last_error = last_error
                        .unwrap_or_else(|| "attempt did not finish before the deadline".to_string());
                    return Err(AclError::timeout(operation_name, timeout_ms, last_error));
                }
            };

            if !(self.is_transient)(&error) {
                return Err(error);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if final_attempt || remaining.is_zero() {
                return Err(AclError::timeout(operation_name, timeout_ms, error.to_string()));
            }

            attempt += 1;
            let mut backoff = self.jittered_backoff(attempt);
            if backoff >= remaining {
                // Last try, keeping half of what is left for the attempt itself.
                backoff = remaining / 2;
                final_attempt = true;
            }
            last_error = Some(error.to_string());

            warn!(
                operation = operation_name,
                attempt = attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Transient ACL error, will retry"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AclError::cancelled(operation_name)),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}

/// Await `future` unless `cancel` fires first
pub async fn run_cancellable<Fut, T>(
    operation_name: &str,
    cancel: &CancellationToken,
    future: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AclError::cancelled(operation_name)),
        result = future => result,
    }
}
