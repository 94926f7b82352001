//! Image preparation error types.

use std::path::PathBuf;

/// Image preparation error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ImageErrorKind {
    /// Image file could not be opened or decoded
    #[display("Failed to open image {}: {}", path.display(), message)]
    Open {
        /// Path of the source image
        path: PathBuf,
        /// Decoder message
        message: String,
    },
    /// Image has a zero-length side
    #[display("Image has no pixels ({}x{})", width, height)]
    Empty {
        /// Source width
        width: u32,
        /// Source height
        height: u32,
    },
    /// Output file could not be created
    #[display("Failed to create {}: {}", path.display(), message)]
    Create {
        /// Path of the output file
        path: PathBuf,
        /// I/O message
        message: String,
    },
    /// Encoder rejected the image
    #[display("Failed to encode image: {}", _0)]
    Encode(String),
}

/// Image error with source location tracking.
///
/// # Examples
///
/// ```
/// use sheetpost_error::{ImageError, ImageErrorKind};
///
/// let err = ImageError::new(ImageErrorKind::Encode("unsupported color type".into()));
/// assert!(format!("{}", err).contains("unsupported color type"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Image Error: {} at line {} in {}", kind, line, file)]
pub struct ImageError {
    /// The kind of error that occurred
    pub kind: ImageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ImageError {
    /// Create a new ImageError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ImageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
