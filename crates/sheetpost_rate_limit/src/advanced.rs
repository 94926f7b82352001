//! Multi-window rate limiting with burst counting and cooldown.
//!
//! A call is admitted only when every gate agrees:
//! 1. no cooldown is active
//! 2. fewer than `calls_per_minute` calls in the trailing 60 seconds
//! 3. fewer than `calls_per_hour` calls in the trailing hour
//! 4. fewer than `burst_limit` calls since the burst counter was last reset
//!
//! The burst counter resets once more than 60 seconds have passed since its
//! previous reset, independently of the call history.
//!
//! All state lives behind a single mutex, so pruning, counting and recording
//! happen as one unit. Time comes from `tokio::time::Instant`.

use crate::WindowLimits;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);
const MINUTE_RESET_MARGIN: Duration = Duration::from_secs(1);

/// Why a call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DenialReason {
    /// A cooldown is active
    #[display("Cooldown active for {}s", remaining.as_secs())]
    Cooldown {
        /// Time until the cooldown ends
        remaining: Duration,
    },
    /// The trailing minute is full
    #[display("Exceeded limit of {} calls/min", limit)]
    MinuteLimit {
        /// Configured per-minute limit
        limit: u32,
    },
    /// The trailing hour is full
    #[display("Exceeded limit of {} calls/h", limit)]
    HourLimit {
        /// Configured per-hour limit
        limit: u32,
    },
    /// The burst window is full
    #[display("Exceeded burst limit of {} calls", limit)]
    BurstLimit {
        /// Configured burst limit
        limit: u32,
    },
}

/// Outcome of [`AdvancedRateLimiter::can_make_call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDecision {
    /// The call may proceed
    Allowed,
    /// The call must not proceed
    Denied(DenialReason),
}

impl CallDecision {
    /// Whether the call may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, CallDecision::Allowed)
    }

    /// The denial reason, if any.
    pub fn reason(&self) -> Option<DenialReason> {
        match self {
            CallDecision::Allowed => None,
            CallDecision::Denied(reason) => Some(*reason),
        }
    }
}

impl std::fmt::Display for CallDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallDecision::Allowed => write!(f, "OK"),
            CallDecision::Denied(reason) => write!(f, "{}", reason),
        }
    }
}

/// Snapshot of limiter counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    /// Calls recorded since creation
    pub total_calls: u64,
    /// Calls refused since creation
    pub blocked_calls: u64,
    /// Calls in the trailing 60 seconds
    pub calls_last_minute: usize,
    /// Calls in the trailing hour
    pub calls_last_hour: usize,
    /// Calls in the current burst window
    pub burst_count: u32,
    /// Whether a cooldown is active
    pub cooldown_active: bool,
    /// Whole seconds until the cooldown ends
    pub cooldown_remaining: u64,
}

#[derive(Debug)]
struct WindowState {
    history: VecDeque<Instant>,
    burst_count: u32,
    last_burst_reset: Instant,
    cooldown_until: Option<Instant>,
    total_calls: u64,
    blocked_calls: u64,
}

impl WindowState {
    fn new(now: Instant) -> Self {
        Self {
            history: VecDeque::new(),
            burst_count: 0,
            last_burst_reset: now,
            cooldown_until: None,
            total_calls: 0,
            blocked_calls: 0,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.history.front() {
            if now.saturating_duration_since(*oldest) >= HOUR {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    fn count_within(&self, now: Instant, window: Duration) -> usize {
        self.history
            .iter()
            .filter(|t| now.saturating_duration_since(**t) <= window)
            .count()
    }

    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// How long until the oldest call of the trailing minute leaves it.
    fn minute_window_wait(&self, now: Instant) -> Duration {
        self.history
            .iter()
            .find(|t| now.saturating_duration_since(**t) <= MINUTE)
            .map(|oldest| (*oldest + MINUTE).saturating_duration_since(now) + MINUTE_RESET_MARGIN)
            .unwrap_or(MINUTE_RESET_MARGIN)
    }
}

/// Rate limiter with minute, hour and burst windows plus cooldown.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = AdvancedRateLimiter::new("publish", WindowLimits::publishing());
/// if limiter.wait_if_needed().await {
///     client.publish(&post).await?;
/// }
/// ```
#[derive(Debug)]
pub struct AdvancedRateLimiter {
    name: String,
    limits: WindowLimits,
    state: Mutex<WindowState>,
}

impl AdvancedRateLimiter {
    /// Create a limiter with the given window limits.
    pub fn new(name: impl Into<String>, limits: WindowLimits) -> Self {
        Self {
            name: name.into(),
            limits,
            state: Mutex::new(WindowState::new(Instant::now())),
        }
    }

    /// Name used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured limits.
    pub fn limits(&self) -> &WindowLimits {
        &self.limits
    }

    /// Evaluate every gate without recording anything.
    ///
    /// Prunes history older than an hour and may reset the burst counter.
    pub fn can_make_call(&self) -> CallDecision {
        let mut state = self.state.lock();
        self.evaluate(&mut state, Instant::now())
    }

    fn evaluate(&self, state: &mut WindowState, now: Instant) -> CallDecision {
        if let Some(remaining) = state.cooldown_remaining(now) {
            return CallDecision::Denied(DenialReason::Cooldown { remaining });
        }

        state.prune(now);

        let minute_calls = state.count_within(now, MINUTE);
        let hour_calls = state.count_within(now, HOUR);

        if minute_calls >= *self.limits.calls_per_minute() as usize {
            return CallDecision::Denied(DenialReason::MinuteLimit {
                limit: *self.limits.calls_per_minute(),
            });
        }

        if hour_calls >= *self.limits.calls_per_hour() as usize {
            return CallDecision::Denied(DenialReason::HourLimit {
                limit: *self.limits.calls_per_hour(),
            });
        }

        if now.saturating_duration_since(state.last_burst_reset) > MINUTE {
            state.burst_count = 0;
            state.last_burst_reset = now;
        }

        if state.burst_count >= *self.limits.burst_limit() {
            return CallDecision::Denied(DenialReason::BurstLimit {
                limit: *self.limits.burst_limit(),
            });
        }

        CallDecision::Allowed
    }

    /// Record a call made now.
    pub fn record_call(&self) {
        let mut state = self.state.lock();
        Self::record(&mut state, Instant::now());
        debug!(
            limiter = %self.name,
            total_calls = state.total_calls,
            burst_count = state.burst_count,
            "API call recorded"
        );
    }

    fn record(state: &mut WindowState, now: Instant) {
        state.history.push_back(now);
        state.burst_count += 1;
        state.total_calls += 1;
    }

    /// Count a refused call.
    pub fn record_blocked_call(&self, reason: &DenialReason) {
        let blocked_calls = {
            let mut state = self.state.lock();
            state.blocked_calls += 1;
            state.blocked_calls
        };
        warn!(limiter = %self.name, %reason, blocked_calls, "API call blocked by rate limiter");
    }

    /// Deny every call for the configured cooldown period, starting now.
    pub fn trigger_cooldown(&self, reason: &str) {
        let cooldown = self.limits.cooldown();
        self.state.lock().cooldown_until = Some(Instant::now() + cooldown);
        warn!(
            limiter = %self.name,
            reason,
            cooldown_seconds = cooldown.as_secs(),
            "Rate limiter cooldown activated"
        );
    }

    /// Wait out minute-window denials, then record the call.
    ///
    /// Returns `true` once the call is admitted and recorded. Returns `false`
    /// without waiting for cooldown, hour or burst denials, and also when
    /// admission would need more than the configured maximum total wait.
    /// Every denial is counted as a blocked call.
    #[instrument(skip(self), fields(limiter = %self.name))]
    pub async fn wait_if_needed(&self) -> bool {
        let max_wait = self.limits.max_wait();
        let mut waited = Duration::ZERO;

        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                match self.evaluate(&mut state, now) {
                    CallDecision::Allowed => {
                        Self::record(&mut state, now);
                        return true;
                    }
                    CallDecision::Denied(reason) => {
                        state.blocked_calls += 1;
                        warn!(%reason, blocked_calls = state.blocked_calls, "API call blocked by rate limiter");
                        match reason {
                            DenialReason::MinuteLimit { .. } => state.minute_window_wait(now),
                            _ => return false,
                        }
                    }
                }
            };

            if waited + wait > max_wait {
                warn!(
                    waited_seconds = waited.as_secs(),
                    needed_seconds = wait.as_secs(),
                    max_wait_seconds = max_wait.as_secs(),
                    "Giving up on rate limit wait"
                );
                return false;
            }

            info!(wait_seconds = wait.as_secs(), "Waiting for rate limit window");
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Current counters and window occupancy.
    pub fn get_stats(&self) -> LimiterStats {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.prune(now);
        let cooldown = state.cooldown_remaining(now);

        LimiterStats {
            total_calls: state.total_calls,
            blocked_calls: state.blocked_calls,
            calls_last_minute: state.count_within(now, MINUTE),
            calls_last_hour: state.count_within(now, HOUR),
            burst_count: state.burst_count,
            cooldown_active: cooldown.is_some(),
            cooldown_remaining: cooldown.map(|d| d.as_secs()).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_reason_display() {
        let cooldown = DenialReason::Cooldown {
            remaining: Duration::from_secs(42),
        };
        assert_eq!(cooldown.to_string(), "Cooldown active for 42s");
        assert_eq!(
            DenialReason::MinuteLimit { limit: 20 }.to_string(),
            "Exceeded limit of 20 calls/min"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_minute_window_wait_tracks_oldest_entry() {
        let start = Instant::now();
        let mut state = WindowState::new(start);
        state.history.push_back(start);
        tokio::time::advance(Duration::from_secs(20)).await;
        state.history.push_back(Instant::now());

        let wait = state.minute_window_wait(Instant::now());
        assert_eq!(wait, Duration::from_secs(41));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_drops_entries_older_than_hour() {
        let start = Instant::now();
        let mut state = WindowState::new(start);
        state.history.push_back(start);
        tokio::time::advance(HOUR).await;
        state.history.push_back(Instant::now());

        state.prune(Instant::now());
        assert_eq!(state.history.len(), 1);
    }
}
