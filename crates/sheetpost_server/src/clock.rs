//! Wall-clock sources.

use chrono::NaiveDateTime;
use tokio::time::Instant;

/// Source of local wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// The system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock that starts at a fixed time and advances with tokio time.
///
/// Under a paused tokio runtime this gives fully deterministic schedules. On
/// a normal runtime it is a wall clock shifted to start at `start`, which is
/// handy for rehearsing a day's schedule.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedClock {
    start: NaiveDateTime,
    origin: Instant,
}

impl SimulatedClock {
    /// Create a clock reading `start` now.
    pub fn starting_at(start: NaiveDateTime) -> Self {
        Self {
            start,
            origin: Instant::now(),
        }
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.start + elapsed
    }
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn now(&self) -> NaiveDateTime {
        self.as_ref().now()
    }
}
