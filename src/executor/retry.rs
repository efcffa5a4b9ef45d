//! Retry policy for the request executor.

use std::time::Duration;

use crate::error::ApiError;

/// Default bound on retried attempts (total sends = bound + 1).
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

const RETRY_AFTER_MIN_SECS: u64 = 1;
const RETRY_AFTER_MAX_SECS: u64 = 300;

/// Bounds and paces the executor's retry loop.
///
/// The executor never sleeps unless this policy yields a delay: the default
/// honors a server-supplied `Retry-After` and otherwise retries immediately.
/// Callers wanting paced transient retries opt into a [`Backoff`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Upper bound on retried attempts, not counting the initial send.
    pub max_retry_attempts: u32,
    /// Sleep for the server's `Retry-After` (clamped to 1..=300s) when the
    /// classified error carries one.
    pub honor_retry_after: bool,
    /// Optional delay between retries when no `Retry-After` applies.
    pub backoff: Option<Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            honor_retry_after: true,
            backoff: None,
        }
    }
}

/// Delay strategy between retried attempts.
#[derive(Debug, Clone)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base * 2^(attempt-1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { base, max } => {
                let pow = 2u32.saturating_pow(attempt.saturating_sub(1));
                let millis = base
                    .as_millis()
                    .saturating_mul(pow as u128)
                    .min(max.as_millis());
                Duration::from_millis(millis as u64)
            }
        }
    }
}

impl RetryPolicy {
    /// Compute the delay before retry `attempt` (1-based), or `None` to
    /// retry immediately. `error` is the classified failure that triggered
    /// the retry, when one exists (transport failures carry none).
    pub fn delay_for(&self, attempt: u32, error: Option<&ApiError>) -> Option<Duration> {
        if self.honor_retry_after {
            if let Some(secs) = error.and_then(|e| e.retry_after_secs) {
                let secs = secs.clamp(RETRY_AFTER_MIN_SECS, RETRY_AFTER_MAX_SECS);
                return Some(Duration::from_secs(secs));
            }
        }
        self.backoff.as_ref().map(|backoff| backoff.delay_for(attempt))
    }
}
