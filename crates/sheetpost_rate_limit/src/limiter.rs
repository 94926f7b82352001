//! Fixed-interval call pacing using governor.
//!
//! A GCRA quota with a burst of one and a period of `60 / calls_per_minute`
//! seconds admits one call per period, so two granted calls are never closer
//! together than the minimum interval.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use parking_lot::Mutex;
use sheetpost_error::ConfigError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum spacing between consecutive calls.
///
/// Clones share the same underlying quota.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = RateLimiter::new(30)?; // one call every two seconds
/// limiter.wait_if_needed().await;
/// client.publish(&post).await?;
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    name: Arc<str>,
    min_interval: Duration,
    quota: Arc<DirectRateLimiter>,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("min_interval", &self.min_interval)
            .field("last_call", &self.last_call())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter admitting `calls_per_minute` evenly spaced calls.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `calls_per_minute` is zero.
    pub fn new(calls_per_minute: u32) -> Result<Self, ConfigError> {
        Self::named("default", calls_per_minute)
    }

    /// Create a limiter with a name used in log output.
    pub fn named(name: impl Into<Arc<str>>, calls_per_minute: u32) -> Result<Self, ConfigError> {
        if calls_per_minute == 0 {
            return Err(ConfigError::new("calls_per_minute must be positive"));
        }
        let min_interval = Duration::from_secs_f64(60.0 / f64::from(calls_per_minute));
        let quota = Quota::with_period(min_interval).ok_or_else(|| {
            ConfigError::new(format!(
                "Cannot build quota for {} calls per minute",
                calls_per_minute
            ))
        })?;

        Ok(Self {
            name: name.into(),
            min_interval,
            quota: Arc::new(GovernorRateLimiter::direct(quota)),
            last_call: Arc::new(Mutex::new(None)),
        })
    }

    /// Wait until a call is admitted, then record it.
    #[instrument(skip(self), fields(limiter = %self.name))]
    pub async fn wait_if_needed(&self) {
        if self.quota.check().is_err() {
            debug!(min_interval_ms = self.min_interval.as_millis() as u64, "Pacing call");
            self.quota.until_ready().await;
        }
        *self.last_call.lock() = Some(Instant::now());
    }

    /// Minimum spacing between granted calls.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// When the most recent call was granted.
    pub fn last_call(&self) -> Option<Instant> {
        *self.last_call.lock()
    }

    /// Name used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }
}
