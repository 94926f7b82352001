//! Error types for the Sheetpost workspace.
//!
//! This crate provides the foundation error types used by every Sheetpost crate.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use sheetpost_error::{ConfigError, SheetpostResult};
//!
//! fn load() -> SheetpostResult<u32> {
//!     Err(ConfigError::new("calls_per_minute must be positive"))?
//! }
//!
//! assert!(load().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod image;
mod publish;
mod scheduler;

pub use config::ConfigError;
pub use error::{SheetpostError, SheetpostErrorKind, SheetpostResult};
pub use image::{ImageError, ImageErrorKind};
pub use publish::{FailureKind, PublishError, PublishErrorKind, RetryableError};
pub use scheduler::{SchedulerError, SchedulerErrorKind};
