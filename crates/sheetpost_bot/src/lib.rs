//! Spreadsheet-driven publishing for Sheetpost.
//!
//! A [`Publisher`] is the [`PublishTask`](sheetpost_server::PublishTask) the
//! scheduler runs each day. It reads rows from a [`SheetSource`], maps them
//! to [`Post`]s with the column aliases of [`ColumnMapper`], prepares each
//! image, downloading remote ones through an [`ImageFetcher`], and hands it
//! to a [`MediaPublisher`]. Outcomes go to a [`Notifier`],
//! [`BotMetrics`] and the [`SecurityManager`] that guards both APIs.
//!
//! Real spreadsheet, photo-sharing and messaging clients live outside this
//! crate; the provided implementations read JSON exports, record posts
//! instead of uploading them and log notifications.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod fetch;
mod media;
mod metrics;
mod notify;
mod post;
mod publisher;
mod security;
mod sheet;

pub use config::{BotConfig, SecurityConfig};
pub use fetch::{
    HttpImageFetcher, ImageFetcher, WORK_FILE_PREFIX, drive_direct_url, is_remote, work_file_name,
};
pub use media::{DryRunPublisher, MediaPublisher, PublishedMedia};
pub use metrics::{ApiKind, BotMetrics, HealthReport, HealthStatus, MetricsSnapshot};
pub use notify::{LogNotifier, NoOpNotifier, Notifier};
pub use post::{ColumnMapper, Post, PostField, Row, parse_date_value};
pub use publisher::{Pacing, PostOutcome, Publisher};
pub use security::{SecurityManager, SecurityStatus};
pub use sheet::{InMemorySheetSource, JsonSheetSource, SheetSource};
