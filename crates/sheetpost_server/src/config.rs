//! Schedule configuration.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use sheetpost_error::{ConfigError, SchedulerError, SchedulerErrorKind};
use std::time::Duration;

/// A validated time of day, to the minute.
///
/// # Examples
///
/// ```
/// use sheetpost_server::TargetTime;
///
/// let target = TargetTime::new(9, 5).unwrap();
/// assert_eq!(target.to_string(), "09:05");
/// assert!(TargetTime::new(24, 0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TargetTime {
    hour: u32,
    minute: u32,
}

impl TargetTime {
    /// Create a target time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTargetTime` when the hour is not below 24 or the
    /// minute is not below 60.
    #[track_caller]
    pub fn new(hour: u32, minute: u32) -> Result<Self, SchedulerError> {
        if hour >= 24 || minute >= 60 {
            return Err(SchedulerError::new(SchedulerErrorKind::InvalidTargetTime {
                hour,
                minute,
            }));
        }
        Ok(Self { hour, minute })
    }

    /// Hour of day.
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Minute of hour.
    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Whether `now` falls within this target minute.
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        now.hour() == self.hour && now.minute() == self.minute
    }
}

impl std::fmt::Display for TargetTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The `[schedule]` configuration section.
///
/// # Example
///
/// ```toml
/// [schedule]
/// target_hour = 16
/// target_minute = 0
/// check_interval_seconds = 60
/// shutdown_timeout_seconds = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Hour of the daily run
    #[serde(default = "default_target_hour")]
    pub target_hour: u32,

    /// Minute of the daily run
    #[serde(default)]
    pub target_minute: u32,

    /// Seconds between clock checks
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,

    /// Seconds shutdown waits for an in-flight execution
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

fn default_target_hour() -> u32 {
    16
}

fn default_check_interval() -> u64 {
    60
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            target_hour: default_target_hour(),
            target_minute: 0,
            check_interval_seconds: default_check_interval(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl ScheduleConfig {
    /// The configured target time.
    pub fn target_time(&self) -> Result<TargetTime, SchedulerError> {
        TargetTime::new(self.target_hour, self.target_minute)
    }

    /// Interval between clock checks.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    /// Default grace period for shutdown.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_hour >= 24 || self.target_minute >= 60 {
            return Err(ConfigError::new(format!(
                "Invalid target time {:02}:{:02}",
                self.target_hour, self.target_minute
            )));
        }
        if self.check_interval_seconds == 0 {
            return Err(ConfigError::new("check_interval_seconds must be positive"));
        }
        Ok(())
    }
}
