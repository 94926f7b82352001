//! The contract between the scheduler and the work it runs.

use async_trait::async_trait;
use serde::Serialize;
use sheetpost_error::PublishError;

/// Counts from one publish execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// Posts due for publishing
    pub due: usize,
    /// Posts published
    pub published: usize,
    /// Posts that failed
    pub failed: usize,
    /// Posts skipped by rate limits
    pub skipped: usize,
}

impl PublishReport {
    /// A report for an execution that skipped everything.
    pub fn skipped(due: usize) -> Self {
        Self {
            due,
            skipped: due,
            ..Self::default()
        }
    }
}

/// Work triggered by the scheduler.
///
/// `run` may be invoked again under the scheduler's retry policy when it
/// fails with a retryable error, so it should tolerate repeated calls.
#[async_trait]
pub trait PublishTask: Send + Sync + 'static {
    /// Name used in log output.
    fn name(&self) -> &str {
        "publish"
    }

    /// Execute one publishing pass.
    async fn run(&self) -> Result<PublishReport, PublishError>;

    /// Release resources at scheduler shutdown.
    async fn cleanup(&self) {}
}
