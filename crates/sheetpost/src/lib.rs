//! Sheetpost - daily photo posts from a spreadsheet
//!
//! Sheetpost reads scheduled posts from a spreadsheet, reshapes each image
//! into an aspect ratio the photo platform accepts and publishes the posts
//! due today at a fixed time of day, under rate limits and retries.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sheetpost::{SheetpostConfig, build_pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SheetpostConfig::load()?;
//!     let pipeline = build_pipeline(&config)?;
//!     let listener = pipeline.scheduler.spawn_signal_listener();
//!     pipeline.scheduler.start().await?;
//!     listener.await?;
//!     Ok(())
//! }
//! ```
//!
//! # Cargo Features
//!
//! - `observability` - OpenTelemetry span export to stdout
//!
//! # Architecture
//!
//! - `sheetpost_error` - Error types
//! - `sheetpost_rate_limit` - Pacing, multi-window limits and retry
//! - `sheetpost_media` - Image aspect-ratio normalization
//! - `sheetpost_server` - Daily scheduler with graceful shutdown
//! - `sheetpost_bot` - Spreadsheet rows to published posts
//!
//! This crate (`sheetpost`) re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod observability;
mod pipeline;

pub use config::{LimitsConfig, SheetpostConfig};
pub use observability::{ObservabilityConfig, init_observability};
pub use pipeline::{DryRunTask, Pipeline, build_pipeline};

pub use sheetpost_bot::*;
pub use sheetpost_error::*;
pub use sheetpost_media::*;
pub use sheetpost_rate_limit::*;
pub use sheetpost_server::*;
