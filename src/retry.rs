//! Retry configuration and backoff calculation.
//!
//! [`RetryConfig`] controls how many times a failed attempt is repeated and
//! how long to wait between attempts. The delay computation is a pure
//! function of the attempt number, so it is unit-testable without real
//! time; the orchestrator owns the attempt counter and performs the sleep.

use std::time::Duration;

/// Configuration for retry behaviour on transient failures.
///
/// Uses exponential backoff with optional jitter:
///
/// ```rust
/// # use muninn::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(false);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    /// 0 = single attempt, no retry. Default: 3.
    pub max_retries: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 10s.
    pub max_delay: Duration,
    /// Whether to add random jitter (up to +50%) to delays. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

/// Outcome of consulting the retry policy after a retryable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then attempt again.
    RetryAfter(Duration),
    /// The attempt budget is exhausted; surface the terminal error.
    GiveUp,
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the maximum number of retries after the initial attempt.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at
    /// `max_delay`. Does NOT include jitter; see
    /// [`effective_delay()`](Self::effective_delay) for the full calculation.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the effective delay, applying jitter when enabled.
    ///
    /// Jitter adds a uniformly random 0–50% on top of the base delay, which
    /// keeps concurrent retry storms from synchronising.
    pub fn effective_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter && !base.is_zero() {
            let extra = rand::random::<f64>() * 0.5;
            base + base.mul_f64(extra)
        } else {
            base
        }
    }

    /// Decide whether a retryable failure at `attempt` (0-indexed) gets
    /// another attempt under a budget of `max_retries`.
    ///
    /// Pure with respect to state: attempt counters live in the caller.
    /// `max_retries` is passed in rather than read from `self` so per-call
    /// overrides can shadow the configured default.
    pub fn decide(&self, attempt: u32, max_retries: u32) -> RetryDecision {
        if attempt < max_retries {
            RetryDecision::RetryAfter(self.effective_delay(attempt))
        } else {
            RetryDecision::GiveUp
        }
    }
}
