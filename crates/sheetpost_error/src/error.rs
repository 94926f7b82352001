//! Top-level error wrapper types.

use crate::{ConfigError, ImageError, PublishError, SchedulerError};

/// Union of every Sheetpost error.
///
/// # Examples
///
/// ```
/// use sheetpost_error::{ConfigError, SheetpostError};
///
/// let err: SheetpostError = ConfigError::new("bad interval").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum SheetpostErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Image preparation error
    #[from(ImageError)]
    Image(ImageError),
    /// Publishing error
    #[from(PublishError)]
    Publish(PublishError),
    /// Scheduler error
    #[from(SchedulerError)]
    Scheduler(SchedulerError),
}

/// Sheetpost error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Sheetpost Error: {}", _0)]
pub struct SheetpostError(Box<SheetpostErrorKind>);

impl SheetpostError {
    /// Create a new error from a kind.
    pub fn new(kind: SheetpostErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SheetpostErrorKind {
        &self.0
    }
}

impl<T> From<T> for SheetpostError
where
    T: Into<SheetpostErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Sheetpost operations.
pub type SheetpostResult<T> = std::result::Result<T, SheetpostError>;
