//! Retry with backoff.
//!
//! Generic over any idempotent-enough async operation, not just commands.
//! Only `ExecutionFailure` is retried; validation and dispatch errors
//! surface immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ToolError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Total attempt count, first try included.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_attempts: 3,
        }
    }
}

/// Delay schedule between attempts. `None` means give up.
pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;
    /// Delay before the attempt after `attempt` (0-based) failed.
    fn next_delay(&self, attempt: u32, error: &str) -> Option<Duration>;
    fn max_attempts(&self) -> u32;
}

pub struct ExponentialBackoff {
    config: RetryConfig,
}

pub struct LinearBackoff {
    config: RetryConfig,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        if attempt.saturating_add(1) >= self.config.max_attempts {
            return None;
        }
        let exp = 1u64 << attempt.min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        Some(Duration::from_millis(delay.min(self.config.max_delay_ms)))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

impl RetryStrategy for LinearBackoff {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        if attempt.saturating_add(1) >= self.config.max_attempts {
            return None;
        }
        let multiplier = u64::from(attempt.saturating_add(1));
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        Some(Duration::from_millis(delay.min(self.config.max_delay_ms)))
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

/// Run `op` under the given schedule, returning the last error when the
/// schedule is exhausted. The attempt index is passed through for logging.
pub async fn run_with_retry<T, F, Fut>(
    strategy: &dyn RetryStrategy,
    mut op: F,
) -> Result<T, ToolError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ToolError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => match strategy.next_delay(attempt, &err.to_string())
            {
                Some(delay) => {
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        strategy = strategy.name(),
                        "retrying after failure: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}
