//! Scheduler error types.

use crate::PublishError;

/// Scheduler error conditions.
#[derive(Debug, Clone, derive_more::Display)]
pub enum SchedulerErrorKind {
    /// `start` was called on a scheduler that is already running
    #[display("Scheduler is already running")]
    AlreadyRunning,
    /// A task execution is still in flight
    #[display("A publish task is already in flight")]
    TaskInFlight,
    /// Shutdown is in progress and no new executions are accepted
    #[display("Scheduler is shutting down")]
    ShuttingDown,
    /// Target time is not a valid time of day
    #[display("Invalid target time {:02}:{:02}", hour, minute)]
    InvalidTargetTime {
        /// Requested hour
        hour: u32,
        /// Requested minute
        minute: u32,
    },
    /// Check interval must be positive
    #[display("Check interval must be at least one second")]
    InvalidInterval,
    /// The publish task returned an error
    #[display("Publish task failed: {}", _0)]
    Task(PublishError),
    /// The publish task panicked or was cancelled
    #[display("Publish task aborted: {}", _0)]
    TaskAborted(String),
    /// A cleanup callback failed
    #[display("Cleanup callback failed: {}", _0)]
    Cleanup(String),
}

/// Scheduler error with source location tracking.
///
/// # Examples
///
/// ```
/// use sheetpost_error::{SchedulerError, SchedulerErrorKind};
///
/// let err = SchedulerError::new(SchedulerErrorKind::AlreadyRunning);
/// assert!(format!("{}", err).contains("already running"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Scheduler Error: {} at line {} in {}", kind, line, file)]
pub struct SchedulerError {
    /// The kind of error that occurred
    pub kind: SchedulerErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SchedulerError {
    /// Create a new SchedulerError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SchedulerErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl From<PublishError> for SchedulerError {
    #[track_caller]
    fn from(err: PublishError) -> Self {
        Self::new(SchedulerErrorKind::Task(err))
    }
}
