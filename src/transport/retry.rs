//! Retry with exponential backoff
//!
//! [`RetryConfig`] describes the policy; [`Backoff`] walks the delay schedule for
//! one logical request. Rate-limit waits (`retry-after`) are applied by the
//! transport directly and never advance the schedule.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use hyrelog::transport::{Backoff, RetryConfig};
//!
//! let config = RetryConfig::default().with_initial_delay(Duration::from_millis(100));
//! let mut backoff = Backoff::new(&config);
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(200));
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::seconds;

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting initial attempt)
    pub max_retries: u32,
    /// Delay before the first backoff retry
    #[serde(with = "seconds")]
    pub initial_delay: Duration,
    /// Maximum delay between retries
    #[serde(with = "seconds")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each time)
    pub multiplier: f64,
    /// HTTP status codes worth retrying
    pub retryable_status_codes: BTreeSet<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
        }
    }
}

impl RetryConfig {
    /// Policy that makes exactly one attempt.
    pub fn disabled() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Create a new config with specified max retries
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set max delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Replace the retryable status code set
    pub fn with_retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Total attempts for one logical request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

/// Delay schedule for one logical request.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            delay: config.initial_delay.min(config.max_delay),
            max_delay: config.max_delay,
            multiplier: config.multiplier,
        }
    }

    /// Return the current delay and advance to `min(delay * multiplier, max_delay)`.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay;
        // Capped before conversion: an uncapped product may not fit a Duration.
        let next = (current.as_secs_f64() * self.multiplier).min(self.max_delay.as_secs_f64());
        self.delay = Duration::try_from_secs_f64(next).unwrap_or(self.max_delay);
        current
    }
}

/// Parse a `retry-after` header value given in (possibly fractional) seconds.
///
/// Negative, non-numeric and unrepresentably large values are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
