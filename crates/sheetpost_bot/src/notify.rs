//! Operator notifications.

use async_trait::async_trait;
use sheetpost_error::PublishError;
use tracing::info;

/// A channel that tells the operator what happened.
///
/// Delivery failures are logged by the caller and never fail a publish.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Deliver `message`.
    async fn notify(&self, message: &str) -> Result<(), PublishError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<(), PublishError> {
        info!(target: "sheetpost::notify", "{}", message);
        Ok(())
    }
}

/// Discards notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, _message: &str) -> Result<(), PublishError> {
        Ok(())
    }
}

#[async_trait]
impl<N: Notifier> Notifier for std::sync::Arc<N> {
    async fn notify(&self, message: &str) -> Result<(), PublishError> {
        self.as_ref().notify(message).await
    }
}
