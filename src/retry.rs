//! Retry policy: exponential backoff with jitter.
//!
//! The transport retries transient failures (connection errors, `429`,
//! `5xx`) with exponentially growing, jittered delays. Defaults: 10
//! attempts, 1 s initial delay, 60 s cap, factor 1.5 — override with the
//! `with_*` setters. Other `4xx` statuses are never retried; they carry
//! a structured error payload the caller needs to see immediately.

use std::time::Duration;

use reqwest::StatusCode;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap on the delay between retries.
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each attempt.
    pub backoff_multiplier: f64,

    /// Random jitter to prevent thundering herd (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.5,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter factor (clamped to 0.0..=1.0).
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-based), with exponential
    /// backoff, cap, and jitter applied.
    ///
    /// The jitter is multiplicative: the capped delay is scaled by a
    /// random factor in `[1 - j/2, 1 + j/2]` so concurrent clients
    /// spread out instead of retrying in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ceiling = self.max_delay.as_secs_f64();
        let exact =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        // clamp also absorbs the infinity a large attempt count
        // produces.
        let capped = exact.clamp(0.0, ceiling);

        let spread = (rand::random::<f64>() - 0.5) * self.jitter_factor;
        Duration::from_secs_f64((capped * (1.0 + spread)).max(0.0))
    }
}

/// Whether a response status warrants a retry.
///
/// `429` and all `5xx` are transient; everything else bubbles to the
/// caller immediately.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert_eq!(config.backoff_multiplier, 1.5);
    }

    #[test]
    fn test_builder_chain() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(30))
            .with_backoff_multiplier(2.0)
            .with_jitter_factor(0.2);

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.jitter_factor, 0.2);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(4))
            .with_backoff_multiplier(2.0)
            .with_jitter_factor(0.0);

        let d0 = config.delay_for(0);
        let d1 = config.delay_for(1);
        let d5 = config.delay_for(5);

        assert!(d1 > d0);
        assert_eq!(d5, Duration::from_secs(4)); // capped
        // An attempt count large enough to overflow the exponent still
        // lands on the cap.
        assert_eq!(config.delay_for(200), Duration::from_secs(4));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryConfig::new().with_max_attempts(0).max_attempts, 1);
    }
}
