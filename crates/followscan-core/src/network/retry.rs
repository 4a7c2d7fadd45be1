//! Retry logic with exponential backoff.
//!
//! - Exponential backoff (delay doubles each attempt), capped
//! - Optional jitter
//! - Server wait hints (`Retry-After`) override the computed delay
//! - Statistics tracking

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub base_delay: Duration,
    /// Maximum delay cap, also applied to server hints.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total attempts, counting the first; never below one.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; later retries double it.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Upper bound for any single wait, server hints included.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Randomize each wait to spread out concurrent retries.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff before retry number `attempt + 1`: `base_delay * 2^attempt`,
    /// capped at `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        if !self.jitter {
            return delay;
        }
        // Scale by 0.5..1.5 so the mean stays at the computed delay
        delay
            .mul_f64(rand::rng().random_range(0.5..1.5))
            .min(self.max_delay)
    }

    /// Delay before the next attempt, honouring a server hint when present.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(self.max_delay),
            None => self.calculate_delay(attempt),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Permanent failure.
    Stop,
    /// Retry after the computed backoff.
    Retry,
    /// Retry after the given server-provided wait.
    RetryAfter(Duration),
}

/// Statistics about a retry operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub success: bool,
    /// Whether the loop ended because attempts ran out (not a permanent error).
    pub exhausted: bool,
    pub last_error: Option<String>,
}

/// Retry an async operation with exponential backoff.
///
/// `classify` decides, per error, whether another attempt is made and how
/// long to wait first.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    classify: impl Fn(&E) -> RetryDecision,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut stats = RetryStats::default();
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        stats.attempts = attempt + 1;

        let e = match operation().await {
            Ok(value) => {
                stats.success = true;
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return (Ok(value), stats);
            }
            Err(e) => e,
        };

        stats.last_error = Some(e.to_string());

        let hint = match classify(&e) {
            RetryDecision::Stop => {
                debug!("Error is not retryable: {}", e);
                return (Err(e), stats);
            }
            RetryDecision::Retry => None,
            RetryDecision::RetryAfter(wait) => Some(wait),
        };

        if attempt + 1 >= max_attempts {
            warn!(
                "All {} attempts exhausted. Last error: {}",
                max_attempts, e
            );
            stats.exhausted = true;
            return (Err(e), stats);
        }

        let delay = config.delay_for(attempt, hint);
        stats.total_delay += delay;

        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt + 1,
            max_attempts,
            e,
            delay
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
