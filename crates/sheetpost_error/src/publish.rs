//! Publishing error types and retry classification.

use serde::{Deserialize, Serialize};

/// Classification of a failed external call.
///
/// Retry policies decide from this value alone whether another attempt is
/// worth making.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// The remote side did not answer in time
    Timeout,
    /// The remote side asked us to slow down ("please wait")
    Throttled,
    /// The connection was dropped mid-request
    ConnectionReset,
    /// Any other transport failure
    Network,
    /// The remote side failed while handling a valid request
    ServerError,
    /// Credentials were rejected
    Authentication,
    /// The request itself was invalid
    InvalidInput,
    /// A referenced resource does not exist
    NotFound,
    /// Unclassified failure
    Other,
}

impl FailureKind {
    /// The failure kinds retried by default.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetpost_error::FailureKind;
    ///
    /// assert!(FailureKind::transient().contains(&FailureKind::Timeout));
    /// assert!(!FailureKind::transient().contains(&FailureKind::Authentication));
    /// ```
    pub fn transient() -> Vec<FailureKind> {
        vec![
            FailureKind::Timeout,
            FailureKind::Throttled,
            FailureKind::ConnectionReset,
            FailureKind::Network,
            FailureKind::ServerError,
        ]
    }

    /// Whether this kind belongs to the default transient set.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout
                | FailureKind::Throttled
                | FailureKind::ConnectionReset
                | FailureKind::Network
                | FailureKind::ServerError
        )
    }
}

/// Publishing error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PublishErrorKind {
    /// An external call failed
    #[display("{} during {}: {}", failure, operation, message)]
    Request {
        /// Failure classification
        failure: FailureKind,
        /// Name of the operation that failed
        operation: String,
        /// Remote or transport message
        message: String,
    },
    /// No image could be found for a post
    #[display("No image available for row {}", _0)]
    MissingImage(usize),
    /// Row data could not be turned into a post
    #[display("Invalid row data: {}", _0)]
    InvalidRow(String),
}

/// Publishing error with source location tracking.
///
/// # Examples
///
/// ```
/// use sheetpost_error::{FailureKind, PublishError, RetryableError};
///
/// let err = PublishError::request(FailureKind::Throttled, "publish", "please wait a few minutes");
/// assert!(err.is_retryable());
/// assert_eq!(err.failure_kind(), FailureKind::Throttled);
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Publish Error: {} at line {} in {}", kind, line, file)]
pub struct PublishError {
    /// The kind of error that occurred
    pub kind: PublishErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PublishError {
    /// Create a new PublishError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PublishErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a failed external call.
    #[track_caller]
    pub fn request(
        failure: FailureKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(PublishErrorKind::Request {
            failure,
            operation: operation.into(),
            message: message.into(),
        })
    }
}

/// Trait for errors that retry policies can classify.
///
/// Implementors report a [`FailureKind`]; a policy retries only the kinds it
/// was configured with. `is_retryable` answers against the default set.
pub trait RetryableError {
    /// Classify this failure.
    fn failure_kind(&self) -> FailureKind;

    /// Returns true if this error belongs to the default transient set.
    fn is_retryable(&self) -> bool {
        self.failure_kind().is_transient()
    }
}

impl RetryableError for PublishError {
    fn failure_kind(&self) -> FailureKind {
        match &self.kind {
            PublishErrorKind::Request { failure, .. } => *failure,
            PublishErrorKind::MissingImage(_) => FailureKind::NotFound,
            PublishErrorKind::InvalidRow(_) => FailureKind::InvalidInput,
        }
    }
}
