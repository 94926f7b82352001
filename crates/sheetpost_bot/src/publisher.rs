//! The daily publishing pass.

use crate::fetch::{WORK_FILE_PREFIX, is_remote};
use crate::{
    ApiKind, BotConfig, BotMetrics, ColumnMapper, HttpImageFetcher, ImageFetcher, MediaPublisher,
    Notifier, Post, PublishedMedia, Row, SecurityManager, SheetSource,
};
use async_trait::async_trait;
use sheetpost_error::{
    ConfigError, ImageError, ImageErrorKind, PublishError, PublishErrorKind,
};
use sheetpost_media::{ImageOutcome, find_default_image, prepare_image};
use sheetpost_rate_limit::{PacingConfig, RateLimiter, RetryPolicy};
use sheetpost_server::{Clock, PublishReport, PublishTask, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Characters of post content shown in notifications.
const PREVIEW_CHARS: usize = 100;

/// Steady pacing in front of each external API.
#[derive(Debug, Clone)]
pub struct Pacing {
    publish: RateLimiter,
    sheets: RateLimiter,
}

impl Pacing {
    /// Build both limiters from the `[pacing]` section.
    pub fn from_config(config: &PacingConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            publish: RateLimiter::named("publish", *config.publish_calls_per_minute())?,
            sheets: RateLimiter::named("sheets", *config.sheets_calls_per_minute())?,
        })
    }
}

/// A local image ready for preparation.
struct SourceImage {
    path: PathBuf,
    downloaded: bool,
}

impl SourceImage {
    fn local(path: PathBuf) -> Self {
        Self {
            path,
            downloaded: false,
        }
    }
}

/// What happened to one post.
#[derive(Debug)]
pub enum PostOutcome {
    /// Uploaded
    Published(PublishedMedia),
    /// Upload or preparation failed
    Failed(PublishError),
    /// Refused by the publishing rate limiter
    Skipped,
}

/// Publishes the posts due today from a spreadsheet.
///
/// Each pass fetches rows, keeps unpublished posts dated today and publishes
/// them one by one. A failing post is reported and counted; it never stops
/// the rest of the pass.
pub struct Publisher<S, P, N, C = SystemClock> {
    sheet: S,
    media: P,
    notifier: N,
    clock: C,
    fetcher: Arc<dyn ImageFetcher>,
    security: Arc<SecurityManager>,
    metrics: BotMetrics,
    retry: RetryPolicy,
    pacing: Option<Pacing>,
    images_dir: PathBuf,
    work_dir: PathBuf,
}

impl<S: SheetSource, P: MediaPublisher, N: Notifier> Publisher<S, P, N, SystemClock> {
    /// Create a publisher with default limits, retries and directories.
    pub fn new(sheet: S, media: P, notifier: N) -> Self {
        let config = BotConfig::default();
        Self {
            sheet,
            media,
            notifier,
            clock: SystemClock,
            fetcher: Arc::new(HttpImageFetcher::default()),
            security: Arc::new(SecurityManager::default()),
            metrics: BotMetrics::new(),
            retry: RetryPolicy::default(),
            pacing: None,
            images_dir: config.default_images_dir().clone(),
            work_dir: config.work_dir().clone(),
        }
    }
}

impl<S, P, N, C> Publisher<S, P, N, C>
where
    S: SheetSource,
    P: MediaPublisher,
    N: Notifier,
    C: Clock,
{
    /// Replace the clock that decides which day it is.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Publisher<S, P, N, C2> {
        Publisher {
            sheet: self.sheet,
            media: self.media,
            notifier: self.notifier,
            clock,
            fetcher: self.fetcher,
            security: self.security,
            metrics: self.metrics,
            retry: self.retry,
            pacing: self.pacing,
            images_dir: self.images_dir,
            work_dir: self.work_dir,
        }
    }

    /// Download remote images with `fetcher`.
    pub fn with_image_fetcher(mut self, fetcher: impl ImageFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    /// Share a security manager.
    pub fn with_security(mut self, security: Arc<SecurityManager>) -> Self {
        self.security = security;
        self
    }

    /// Share a metrics collector.
    pub fn with_metrics(mut self, metrics: BotMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Retry policy for every external call.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Pace external calls.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Take directories from the `[bot]` section.
    pub fn with_config(mut self, config: &BotConfig) -> Self {
        self.images_dir = config.default_images_dir().clone();
        self.work_dir = config.work_dir().clone();
        self
    }

    /// The shared metrics collector.
    pub fn metrics(&self) -> &BotMetrics {
        &self.metrics
    }

    /// The shared security manager.
    pub fn security(&self) -> &Arc<SecurityManager> {
        &self.security
    }

    /// The sheet source.
    pub fn sheet(&self) -> &S {
        &self.sheet
    }

    /// The media publisher.
    pub fn media(&self) -> &P {
        &self.media
    }

    /// Publish every unpublished post dated today.
    ///
    /// # Errors
    ///
    /// Returns the sheet error when rows cannot be fetched. Per-post failures
    /// are counted in the report instead.
    #[instrument(skip(self))]
    pub async fn publish_due_posts(&self) -> Result<PublishReport, PublishError> {
        let today = self.clock.now().date();

        let Some(rows) = self.fetch_rows().await? else {
            return Ok(PublishReport::default());
        };

        let due: Vec<Post> = ColumnMapper::map_rows(&rows)
            .into_iter()
            .filter(|post| !post.published && post.is_due_on(today))
            .collect();

        if due.is_empty() {
            info!(%today, rows = rows.len(), "No posts due today");
            return Ok(PublishReport::default());
        }
        info!(%today, due = due.len(), "Publishing posts due today");

        let mut report = PublishReport {
            due: due.len(),
            ..PublishReport::default()
        };
        for post in &due {
            match self.publish_post(post).await {
                PostOutcome::Published(_) => report.published += 1,
                PostOutcome::Failed(_) => report.failed += 1,
                PostOutcome::Skipped => report.skipped += 1,
            }
        }

        info!(
            published = report.published,
            failed = report.failed,
            skipped = report.skipped,
            "Publishing pass finished"
        );
        Ok(report)
    }

    /// Rows from the sheet, or `None` when the sheets limiter refuses the call.
    async fn fetch_rows(&self) -> Result<Option<Vec<Row>>, PublishError> {
        if !self.security.check_sheets_rate_limit().await {
            self.metrics.record_api_call(ApiKind::Sheets, true);
            warn!("Sheet fetch blocked by rate limiter, skipping this pass");
            return Ok(None);
        }

        let rows = self
            .retry
            .run("fetch_rows", || self.fetch_rows_attempt())
            .await?;
        debug!(rows = rows.len(), "Fetched sheet rows");
        Ok(Some(rows))
    }

    /// One paced call to the sheet source.
    async fn fetch_rows_attempt(&self) -> Result<Vec<Row>, PublishError> {
        if let Some(pacing) = &self.pacing {
            pacing.sheets.wait_if_needed().await;
        }
        self.metrics.record_api_call(ApiKind::Sheets, false);
        self.sheet.fetch_rows().await
    }

    /// One paced call to the publishing API.
    async fn publish_attempt(
        &self,
        image: &Path,
        caption: &str,
    ) -> Result<PublishedMedia, PublishError> {
        if let Some(pacing) = &self.pacing {
            pacing.publish.wait_if_needed().await;
        }
        self.metrics.record_api_call(ApiKind::Publish, false);
        self.media.publish(image, caption).await
    }

    /// Publish one post, reporting the outcome through notifications,
    /// metrics and the security manager.
    #[instrument(skip(self, post), fields(row = post.sheet_row()))]
    pub async fn publish_post(&self, post: &Post) -> PostOutcome {
        if !self.security.check_publish_rate_limit().await {
            self.metrics.record_api_call(ApiKind::Publish, true);
            warn!("Publishing blocked by rate limiter, skipping post");
            return PostOutcome::Skipped;
        }

        let source = match self.resolve_image(post).await {
            Ok(source) => source,
            Err(err) => {
                self.handle_failure(post, &err).await;
                return PostOutcome::Failed(err);
            }
        };

        let prepared = self.prepare(source.path.clone()).await;
        let image = prepared.usable_path().to_path_buf();
        let caption = post.full_caption();
        info!(image = %image.display(), caption = %post.preview(PREVIEW_CHARS), "Publishing post");

        let result = self
            .retry
            .run("publish", || self.publish_attempt(&image, &caption))
            .await;

        if let Some(temporary) = prepared.temporary_file() {
            remove_file(temporary).await;
        }
        if source.downloaded {
            remove_file(&source.path).await;
        }

        match result {
            Ok(media) => {
                self.handle_success(post, &media, &image).await;
                PostOutcome::Published(media)
            }
            Err(err) => {
                self.handle_failure(post, &err).await;
                PostOutcome::Failed(err)
            }
        }
    }

    /// Local image for a post.
    ///
    /// Remote sources are downloaded into the work directory and a failed
    /// download fails the post. Local sources are tried as given, then
    /// relative to the images directory, then the directory's default image
    /// is used.
    async fn resolve_image(&self, post: &Post) -> Result<SourceImage, PublishError> {
        let source = post.image_source.trim();
        if is_remote(source) {
            self.ensure_work_dir().await;
            let path = self
                .retry
                .run("download_image", || self.fetcher.fetch(source, &self.work_dir))
                .await?;
            return Ok(SourceImage {
                path,
                downloaded: true,
            });
        }

        if !source.is_empty() {
            let direct = PathBuf::from(source);
            if direct.is_file() {
                return Ok(SourceImage::local(direct));
            }
            let in_dir = self.images_dir.join(source);
            if in_dir.is_file() {
                return Ok(SourceImage::local(in_dir));
            }
            warn!(path = source, "Image not found, using default image");
        }
        find_default_image(&self.images_dir)
            .map(SourceImage::local)
            .ok_or_else(|| PublishError::new(PublishErrorKind::MissingImage(post.sheet_row())))
    }

    async fn ensure_work_dir(&self) {
        if let Err(e) = tokio::fs::create_dir_all(&self.work_dir).await {
            warn!(dir = %self.work_dir.display(), error = %e, "Cannot create work directory");
        }
    }

    async fn prepare(&self, source: PathBuf) -> ImageOutcome {
        self.ensure_work_dir().await;

        let work_dir = self.work_dir.clone();
        let original = source.clone();
        let outcome = tokio::task::spawn_blocking(move || prepare_image(&source, &work_dir))
            .await
            .unwrap_or_else(|e| ImageOutcome::Failed {
                original,
                reason: ImageError::new(ImageErrorKind::Encode(format!(
                    "preparation task failed: {}",
                    e
                ))),
            });

        if let ImageOutcome::Failed { original, reason } = &outcome {
            warn!(
                image = %original.display(),
                error = %reason,
                "Publishing original image unchanged"
            );
        }
        outcome
    }

    async fn handle_success(&self, post: &Post, media: &PublishedMedia, image: &Path) {
        let date = post
            .publish_date
            .map(|d| d.to_string())
            .unwrap_or_default();
        let file_name = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let message = format!(
            "Post published!\n\nContent: {}\nDate: {}\nImage: {}\nLink: {}",
            post.preview(PREVIEW_CHARS),
            date,
            file_name,
            media.url()
        );
        self.notify(&message).await;
        self.metrics.record_post_published();
        info!(media_id = %media.id, url = %media.url(), "Post published");
    }

    async fn handle_failure(&self, post: &Post, err: &PublishError) {
        error!(error = %err, "Failed to publish post");
        self.notify(&format!(
            "Failed to publish row {}: {}",
            post.sheet_row(),
            err.kind
        ))
        .await;
        self.security.report_suspicious_activity(
            "publish_failure",
            &format!("row {}: {}", post.sheet_row(), err.kind),
        );
        self.metrics.record_post_failed();
    }

    async fn notify(&self, message: &str) {
        if let Err(e) = self.notifier.notify(message).await {
            warn!(error = %e, "Notification failed");
        }
    }

    /// Delete downloaded and reshaped images left in the work directory.
    #[instrument(skip(self), fields(dir = %self.work_dir.display()))]
    pub async fn remove_leftover_images(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.work_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "Work directory not readable");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to list work directory");
                    break;
                }
            };
            let is_processed = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(WORK_FILE_PREFIX));
            if is_processed && remove_file(&entry.path()).await {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "Removed leftover processed images");
        }
        removed
    }
}

async fn remove_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed temporary image");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot remove temporary image");
            false
        }
    }
}

#[async_trait]
impl<S, P, N, C> PublishTask for Publisher<S, P, N, C>
where
    S: SheetSource,
    P: MediaPublisher,
    N: Notifier,
    C: Clock,
{
    fn name(&self) -> &str {
        "publish_due_posts"
    }

    async fn run(&self) -> Result<PublishReport, PublishError> {
        self.publish_due_posts().await
    }

    async fn cleanup(&self) {
        self.remove_leftover_images().await;
    }
}
