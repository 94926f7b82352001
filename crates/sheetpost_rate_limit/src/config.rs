//! Configuration structures for limiters and retry.
//!
//! These are the `[limits.*]`, `[pacing]` and `[retry]` sections of
//! `sheetpost.toml`. Every field has a default so partial user files merge
//! cleanly over the bundled configuration.

use serde::{Deserialize, Serialize};
use sheetpost_error::{ConfigError, FailureKind};
use std::time::Duration;

/// Window limits for an [`AdvancedRateLimiter`](crate::AdvancedRateLimiter).
///
/// # Example
///
/// ```toml
/// [limits.publish]
/// calls_per_minute = 20
/// calls_per_hour = 500
/// burst_limit = 5
/// cooldown_seconds = 600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, derive_getters::Getters)]
pub struct WindowLimits {
    /// Maximum calls in any trailing 60 seconds
    #[serde(default = "default_calls_per_minute")]
    calls_per_minute: u32,

    /// Maximum calls in any trailing hour
    #[serde(default = "default_calls_per_hour")]
    calls_per_hour: u32,

    /// Maximum calls per burst window
    #[serde(default = "default_burst_limit")]
    burst_limit: u32,

    /// Length of a triggered cooldown
    #[serde(default = "default_cooldown_seconds")]
    cooldown_seconds: u64,

    /// Upper bound on the total time `wait_if_needed` may sleep
    #[serde(default = "default_max_wait_seconds")]
    max_wait_seconds: u64,
}

fn default_calls_per_minute() -> u32 {
    60
}

fn default_calls_per_hour() -> u32 {
    1000
}

fn default_burst_limit() -> u32 {
    10
}

fn default_cooldown_seconds() -> u64 {
    300
}

fn default_max_wait_seconds() -> u64 {
    300
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self {
            calls_per_minute: default_calls_per_minute(),
            calls_per_hour: default_calls_per_hour(),
            burst_limit: default_burst_limit(),
            cooldown_seconds: default_cooldown_seconds(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl WindowLimits {
    /// Create limits with the default maximum wait.
    pub fn new(
        calls_per_minute: u32,
        calls_per_hour: u32,
        burst_limit: u32,
        cooldown_seconds: u64,
    ) -> Self {
        Self {
            calls_per_minute,
            calls_per_hour,
            burst_limit,
            cooldown_seconds,
            max_wait_seconds: default_max_wait_seconds(),
        }
    }

    /// Replace the maximum total wait.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait_seconds = max_wait.as_secs();
        self
    }

    /// Limits used for the publishing API.
    pub fn publishing() -> Self {
        Self::new(20, 500, 5, 600)
    }

    /// Limits used for the spreadsheet API.
    pub fn sheets() -> Self {
        Self::new(60, 3000, 10, 300)
    }

    /// Cooldown length as a duration.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// Maximum total wait as a duration.
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }

    /// Reject limits that would deny every call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.calls_per_minute == 0 || self.calls_per_hour == 0 || self.burst_limit == 0 {
            return Err(ConfigError::new(format!(
                "Window limits must be positive (per minute {}, per hour {}, burst {})",
                self.calls_per_minute, self.calls_per_hour, self.burst_limit
            )));
        }
        Ok(())
    }
}

/// Steady pacing for the simple [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, derive_getters::Getters)]
pub struct PacingConfig {
    /// Calls per minute against the publishing API
    #[serde(default = "default_publish_pacing")]
    publish_calls_per_minute: u32,

    /// Calls per minute against the spreadsheet API
    #[serde(default = "default_sheets_pacing")]
    sheets_calls_per_minute: u32,
}

fn default_publish_pacing() -> u32 {
    30
}

fn default_sheets_pacing() -> u32 {
    100
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            publish_calls_per_minute: default_publish_pacing(),
            sheets_calls_per_minute: default_sheets_pacing(),
        }
    }
}

impl PacingConfig {
    /// Reject a zero rate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish_calls_per_minute == 0 || self.sheets_calls_per_minute == 0 {
            return Err(ConfigError::new("Pacing rates must be positive"));
        }
        Ok(())
    }
}

/// Parameters for a [`RetryPolicy`](crate::RetryPolicy).
///
/// # Example
///
/// ```toml
/// [retry]
/// max_retries = 3
/// base_delay_seconds = 1.0
/// max_delay_seconds = 60.0
/// backoff_factor = 2.0
/// jitter = true
/// retryable = ["timeout", "throttled"]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, derive_getters::Getters)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    max_retries: usize,

    /// Delay before the first retry
    #[serde(default = "default_base_delay")]
    base_delay_seconds: f64,

    /// Cap on any single delay
    #[serde(default = "default_max_delay")]
    max_delay_seconds: f64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_backoff_factor")]
    backoff_factor: f64,

    /// Scale each delay by a random factor in [0.5, 1.0]
    #[serde(default = "default_jitter")]
    jitter: bool,

    /// Failure kinds worth another attempt
    #[serde(default = "FailureKind::transient")]
    retryable: Vec<FailureKind>,
}

fn default_max_retries() -> usize {
    3
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_seconds: default_base_delay(),
            max_delay_seconds: default_max_delay(),
            backoff_factor: default_backoff_factor(),
            jitter: default_jitter(),
            retryable: FailureKind::transient(),
        }
    }
}

impl RetryConfig {
    /// Reject delays that are negative, inverted or shrinking.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay_seconds.is_nan() || self.base_delay_seconds < 0.0 {
            return Err(ConfigError::new(format!(
                "base_delay_seconds must be non-negative, got {}",
                self.base_delay_seconds
            )));
        }
        if self.max_delay_seconds.is_nan() || self.max_delay_seconds < self.base_delay_seconds {
            return Err(ConfigError::new(format!(
                "max_delay_seconds ({}) must not be below base_delay_seconds ({})",
                self.max_delay_seconds, self.base_delay_seconds
            )));
        }
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            return Err(ConfigError::new(format!(
                "backoff_factor must be at least 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}
