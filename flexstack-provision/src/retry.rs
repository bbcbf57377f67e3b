//! Settle-then-retry for operations that depend on freshly applied grants.
//!
//! Role bindings take effect asynchronously, tens of seconds after the
//! control plane accepts them. Dependent operations wait a fixed settle
//! delay, then retry transient failures with capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ProvisionError;

/// Default wait before the first dependent attempt.
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(30);

/// Bounds on settle-and-retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct RetryPolicy {
    /// Wait before the first attempt.
    pub settle_delay: Duration,
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single wait.
    pub max_backoff: Duration,
    /// Growth factor per failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_attempts: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps; for simulations and tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            settle_delay: Duration::ZERO,
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Override the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Override the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Wait after failed attempt number `attempt` (1-based).
    ///
    /// `initial_backoff * multiplier^(attempt - 1)`, capped at `max_backoff`.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_backoff)
    }
}

/// Wait `policy.settle_delay`, then run `op` until it succeeds, fails with a
/// non-transient error, or the attempt budget runs out.
///
/// `op` receives the 1-based attempt number.
///
/// # Errors
/// Returns the first non-transient error unchanged, or
/// [`ProvisionError::RetriesExhausted`] wrapping the last transient one.
pub async fn retry_after_settle<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, ProvisionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProvisionError>>,
{
    if !policy.settle_delay.is_zero() {
        tracing::info!(
            operation,
            settle_ms = policy.settle_delay.as_millis(),
            "waiting for role bindings to propagate"
        );
        tokio::time::sleep(policy.settle_delay).await;
    }

    let budget = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < budget => {
                let delay = policy.backoff_for_attempt(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    backoff_ms = delay.as_millis(),
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_transient() => {
                return Err(ProvisionError::RetriesExhausted { attempts: attempt, last: Box::new(e) });
            }
            Err(e) => return Err(e),
        }
    }
}
