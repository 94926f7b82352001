//! End-to-end publishing passes against in-memory collaborators.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use serde_json::json;
use sheetpost_bot::{
    BotConfig, BotMetrics, ImageFetcher, InMemorySheetSource, MediaPublisher, Notifier, Pacing,
    PostOutcome, PublishedMedia, Publisher, Row, SecurityManager, SheetSource, work_file_name,
};
use sheetpost_error::{FailureKind, PublishError, PublishErrorKind};
use sheetpost_rate_limit::{PacingConfig, RetryPolicy, RetryPolicyBuilder};
use sheetpost_server::{PublishTask, SimulatedClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Upload {
    image: PathBuf,
    caption: String,
    image_existed: bool,
}

#[derive(Default)]
struct RecordingPublisher {
    fail_when_caption_contains: Option<&'static str>,
    uploads: Mutex<Vec<Upload>>,
}

#[async_trait]
impl MediaPublisher for RecordingPublisher {
    async fn publish(&self, image: &Path, caption: &str) -> Result<PublishedMedia, PublishError> {
        self.uploads.lock().push(Upload {
            image: image.to_path_buf(),
            caption: caption.to_string(),
            image_existed: image.is_file(),
        });
        if self
            .fail_when_caption_contains
            .is_some_and(|needle| caption.contains(needle))
        {
            return Err(PublishError::request(
                FailureKind::InvalidInput,
                "publish",
                "caption rejected",
            ));
        }
        let n = self.uploads.lock().len();
        Ok(PublishedMedia {
            id: format!("media-{n}"),
            code: format!("CODE{n}"),
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<(), PublishError> {
        self.messages.lock().push(message.to_string());
        Ok(())
    }
}

struct BrokenSheet;

#[async_trait]
impl SheetSource for BrokenSheet {
    async fn fetch_rows(&self) -> Result<Vec<Row>, PublishError> {
        Err(PublishError::request(
            FailureKind::Authentication,
            "fetch_rows",
            "credentials rejected",
        ))
    }
}

struct Fixture {
    dir: TempDir,
    publisher: Arc<RecordingPublisher>,
    notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        Self {
            dir,
            publisher: Arc::new(RecordingPublisher::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    fn images(&self) -> PathBuf {
        self.dir.path().join("images")
    }

    fn work(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    fn image(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.images().join(name);
        image::RgbImage::new(width, height).save(&path).unwrap();
        path
    }

    fn config(&self) -> BotConfig {
        let text = format!(
            "default_images_dir = {:?}\nwork_dir = {:?}\n",
            self.images(),
            self.work()
        );
        toml::from_str(&text).unwrap()
    }

    fn publisher<S: SheetSource>(
        &self,
        sheet: S,
    ) -> Publisher<S, Arc<RecordingPublisher>, Arc<RecordingNotifier>, SimulatedClock> {
        Publisher::new(sheet, Arc::clone(&self.publisher), Arc::clone(&self.notifier))
            .with_config(&self.config())
            .with_retry_policy(RetryPolicy::none())
            .with_clock(SimulatedClock::starting_at(noon()))
    }
}

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn rows(value: serde_json::Value) -> Vec<Row> {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_publishes_only_unpublished_posts_due_today() {
    let fx = Fixture::new();
    let wide = fx.image("wide.png", 400, 100);
    let square = fx.image("square.png", 300, 300);

    let sheet = InMemorySheetSource::new(rows(json!([
        { "tresc_postu": "Wide post", "tagi": "#wide", "sciezka_zdjecia": wide, "data_publikacji": "15.03.2024" },
        { "tresc_postu": "Square post", "sciezka_zdjecia": square, "data_publikacji": "2024-03-15" },
        { "tresc_postu": "Already out", "sciezka_zdjecia": square, "data_publikacji": "15.03.2024", "czy_opublikowano": "tak" },
        { "tresc_postu": "Tomorrow", "sciezka_zdjecia": square, "data_publikacji": "16.03.2024" },
        { "tagi": "#orphan", "data_publikacji": "15.03.2024" },
    ])));
    let publisher = fx.publisher(sheet);

    let report = publisher.run().await.unwrap();
    assert_eq!(report.due, 2);
    assert_eq!(report.published, 2);
    assert_eq!(report.failed, 0);

    let uploads = fx.publisher.uploads.lock();
    assert_eq!(uploads[0].caption, "Wide post\n\n#wide");
    assert!(uploads[0].image_existed);
    assert!(uploads[0].image.starts_with(fx.work()));
    assert!(
        !uploads[0].image.exists(),
        "reshaped copy should be removed after publishing"
    );
    assert_eq!(uploads[1].image, square);
    assert!(square.exists());

    let messages = fx.notifier.messages.lock();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("https://www.instagram.com/p/CODE1/"));

    let snapshot = publisher.metrics().snapshot();
    assert_eq!(snapshot.posts_published_total, 2);
    assert_eq!(snapshot.publish_api_calls, 2);
    assert_eq!(snapshot.sheets_api_calls, 1);
}

#[tokio::test]
async fn test_failed_post_does_not_stop_the_rest() {
    let fx = Fixture::new();
    let image = fx.image("photo.jpg", 300, 300);
    let fx = Fixture {
        publisher: Arc::new(RecordingPublisher {
            fail_when_caption_contains: Some("bad"),
            ..RecordingPublisher::default()
        }),
        ..fx
    };

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "bad caption", "image": image, "date": "2024-03-15" },
        { "content": "good caption", "image": image, "date": "2024-03-15" },
    ])));
    let publisher = fx.publisher(sheet);

    let report = publisher.publish_due_posts().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(report.failed, 1);

    let messages = fx.notifier.messages.lock();
    assert!(messages[0].starts_with("Failed to publish row 2"));
    assert!(messages[1].starts_with("Post published!"));

    assert_eq!(publisher.metrics().posts_failed(), 1);
    assert_eq!(
        publisher.security().security_status().suspicious_activity_count,
        1
    );
}

#[tokio::test]
async fn test_default_image_used_when_row_has_none() {
    let fx = Fixture::new();
    let default = fx.image("photo.jpg", 300, 300);

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "no image", "date": "2024-03-15" },
        { "content": "missing file", "image": "nowhere.jpg", "date": "2024-03-15" },
    ])));
    let report = fx.publisher(sheet).publish_due_posts().await.unwrap();

    assert_eq!(report.published, 2);
    let uploads = fx.publisher.uploads.lock();
    assert!(uploads.iter().all(|u| u.image == default));
}

#[tokio::test]
async fn test_relative_image_resolved_against_images_dir() {
    let fx = Fixture::new();
    let expected = fx.image("sunset.png", 300, 300);

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "relative", "photo": "sunset.png", "date": "2024-03-15" },
    ])));
    fx.publisher(sheet).publish_due_posts().await.unwrap();

    assert_eq!(fx.publisher.uploads.lock()[0].image, expected);
}

#[tokio::test]
async fn test_missing_image_fails_post() {
    let fx = Fixture::new();
    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "nothing to show", "date": "2024-03-15" },
    ])));
    let publisher = fx.publisher(sheet);

    let post = sheetpost_bot::ColumnMapper::map_rows(&publisher.sheet().fetch_rows().await.unwrap())
        .remove(0);
    match publisher.publish_post(&post).await {
        PostOutcome::Failed(err) => {
            assert!(matches!(err.kind, PublishErrorKind::MissingImage(2)));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(fx.publisher.uploads.lock().is_empty());
}

#[tokio::test]
async fn test_unreadable_image_published_as_is() {
    let fx = Fixture::new();
    let corrupt = fx.images().join("corrupt.jpg");
    std::fs::write(&corrupt, b"not an image").unwrap();

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "fallback", "image": corrupt, "date": "2024-03-15" },
    ])));
    let report = fx.publisher(sheet).publish_due_posts().await.unwrap();

    assert_eq!(report.published, 1);
    assert_eq!(fx.publisher.uploads.lock()[0].image, corrupt);
}

#[tokio::test]
async fn test_cooldown_skips_posts() {
    let fx = Fixture::new();
    let image = fx.image("photo.jpg", 300, 300);
    let security = Arc::new(SecurityManager::default());
    security.publish_limiter().trigger_cooldown("test");
    let metrics = BotMetrics::new();

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "held back", "image": image, "date": "2024-03-15" },
    ])));
    let publisher = fx
        .publisher(sheet)
        .with_security(security)
        .with_metrics(metrics.clone());

    let report = publisher.publish_due_posts().await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(metrics.blocked_api_calls(), 1);
    assert!(fx.publisher.uploads.lock().is_empty());
}

#[tokio::test]
async fn test_sheet_failure_surfaces() {
    let fx = Fixture::new();
    let err = fx.publisher(BrokenSheet).run().await.unwrap_err();
    assert!(matches!(
        err.kind,
        PublishErrorKind::Request {
            failure: FailureKind::Authentication,
            ..
        }
    ));
}

#[tokio::test]
async fn test_cleanup_removes_leftover_images() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.work()).unwrap();
    std::fs::write(fx.work().join("sheetpost_processed_deadbeef.jpg"), b"x").unwrap();
    std::fs::write(fx.work().join("keep.txt"), b"x").unwrap();

    let publisher = fx.publisher(InMemorySheetSource::default());
    assert_eq!(publisher.remove_leftover_images().await, 1);
    publisher.cleanup().await;

    assert!(fx.work().join("keep.txt").exists());
    assert!(!fx.work().join("sheetpost_processed_deadbeef.jpg").exists());
}

/// Fails with `failure` on the first `failures` calls, then succeeds.
struct FlakyPublisher {
    failure: FailureKind,
    failures: usize,
    attempts: Mutex<Vec<Instant>>,
}

impl FlakyPublisher {
    fn new(failure: FailureKind, failures: usize) -> Self {
        Self {
            failure,
            failures,
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn gaps(&self) -> Vec<Duration> {
        let attempts = self.attempts.lock();
        attempts.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl MediaPublisher for FlakyPublisher {
    async fn publish(&self, _image: &Path, _caption: &str) -> Result<PublishedMedia, PublishError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            attempts.push(Instant::now());
            attempts.len()
        };
        if attempt <= self.failures {
            return Err(PublishError::request(self.failure, "publish", "please wait"));
        }
        Ok(PublishedMedia {
            id: "media-1".into(),
            code: "CODE1".into(),
        })
    }
}

/// Fails once with a network error, then serves its rows.
struct FlakySheet {
    rows: Vec<Row>,
    attempts: Mutex<Vec<Instant>>,
}

#[async_trait]
impl SheetSource for FlakySheet {
    async fn fetch_rows(&self) -> Result<Vec<Row>, PublishError> {
        let first = {
            let mut attempts = self.attempts.lock();
            attempts.push(Instant::now());
            attempts.len() == 1
        };
        if first {
            return Err(PublishError::request(
                FailureKind::Network,
                "fetch_rows",
                "connection dropped",
            ));
        }
        Ok(self.rows.clone())
    }
}

/// Writes a fixed image for every URL, or fails with `failure`.
struct FakeFetcher {
    width: u32,
    height: u32,
    failure: Option<FailureKind>,
    urls: Mutex<Vec<String>>,
    written: Mutex<Vec<PathBuf>>,
}

impl FakeFetcher {
    fn serving(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            failure: None,
            urls: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
        }
    }

    fn failing(failure: FailureKind) -> Self {
        Self {
            failure: Some(failure),
            ..Self::serving(1, 1)
        }
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, PublishError> {
        self.urls.lock().push(url.to_string());
        if let Some(failure) = self.failure {
            return Err(PublishError::request(failure, "download_image", "HTTP 404"));
        }
        let path = dest_dir.join(work_file_name());
        image::RgbImage::new(self.width, self.height)
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .unwrap();
        self.written.lock().push(path.clone());
        Ok(path)
    }
}

/// Retries 10 ms apart without jitter.
fn quick_retries(max_retries: usize) -> RetryPolicy {
    RetryPolicyBuilder::default()
        .max_retries(max_retries)
        .base_delay(Duration::from_millis(10))
        .jitter(false)
        .build()
        .unwrap()
}

/// 120 calls per minute: one call every 500 ms on both APIs.
fn half_second_pacing() -> Pacing {
    let config: PacingConfig =
        toml::from_str("publish_calls_per_minute = 120\nsheets_calls_per_minute = 120").unwrap();
    Pacing::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_every_publish_attempt_is_paced() {
    let fx = Fixture::new();
    let image = fx.image("photo.jpg", 300, 300);
    let flaky = Arc::new(FlakyPublisher::new(FailureKind::Timeout, 2));

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "eventually", "image": image, "date": "2024-03-15" },
    ])));
    let publisher = Publisher::new(sheet, Arc::clone(&flaky), Arc::clone(&fx.notifier))
        .with_config(&fx.config())
        .with_retry_policy(quick_retries(3))
        .with_pacing(half_second_pacing())
        .with_clock(SimulatedClock::starting_at(noon()));

    let report = publisher.publish_due_posts().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(report.failed, 0);

    let gaps = flaky.gaps();
    assert_eq!(gaps.len(), 2);
    for gap in gaps {
        assert!(gap >= Duration::from_millis(450), "attempts only {gap:?} apart");
    }
    assert_eq!(publisher.metrics().snapshot().publish_api_calls, 3);
}

#[tokio::test]
async fn test_every_sheet_fetch_attempt_is_paced() {
    let fx = Fixture::new();
    let sheet = FlakySheet {
        rows: Vec::new(),
        attempts: Mutex::new(Vec::new()),
    };
    let publisher = fx
        .publisher(sheet)
        .with_retry_policy(quick_retries(2))
        .with_pacing(half_second_pacing());

    let report = publisher.publish_due_posts().await.unwrap();
    assert_eq!(report.due, 0);

    let attempts = publisher.sheet().attempts.lock().clone();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1] - attempts[0] >= Duration::from_millis(450));
    assert_eq!(publisher.metrics().snapshot().sheets_api_calls, 2);
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_post() {
    let fx = Fixture::new();
    let image = fx.image("photo.jpg", 300, 300);
    let flaky = Arc::new(FlakyPublisher::new(FailureKind::Throttled, usize::MAX));

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "never", "image": image, "date": "2024-03-15" },
        { "content": "also never", "image": image, "date": "2024-03-15" },
    ])));
    let publisher = Publisher::new(sheet, Arc::clone(&flaky), Arc::clone(&fx.notifier))
        .with_config(&fx.config())
        .with_retry_policy(quick_retries(2))
        .with_clock(SimulatedClock::starting_at(noon()));

    let report = publisher.publish_due_posts().await.unwrap();
    assert_eq!(report.due, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(flaky.attempts.lock().len(), 6);

    let messages = fx.notifier.messages.lock();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("Failed to publish row 2"));
    assert!(messages[0].contains("throttled"));
    assert!(messages[1].starts_with("Failed to publish row 3"));

    assert_eq!(publisher.metrics().posts_failed(), 2);
    assert_eq!(publisher.metrics().snapshot().publish_api_calls, 6);
    assert_eq!(
        publisher.security().security_status().suspicious_activity_count,
        2
    );
}

#[tokio::test]
async fn test_remote_image_downloaded_normalized_and_removed() {
    let fx = Fixture::new();
    let default = fx.image("photo.jpg", 300, 300);
    let fetcher = Arc::new(FakeFetcher::serving(400, 100));
    let url = "https://drive.google.com/file/d/AbC123/view";

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "from the web", "image": url, "date": "2024-03-15" },
    ])));
    let publisher = fx.publisher(sheet).with_image_fetcher(Arc::clone(&fetcher));

    let report = publisher.publish_due_posts().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(fetcher.urls.lock().as_slice(), [url.to_string()]);

    let downloaded = fetcher.written.lock()[0].clone();
    assert!(downloaded.starts_with(fx.work()));
    assert!(!downloaded.exists(), "download should be removed after publishing");

    let uploads = fx.publisher.uploads.lock();
    assert!(uploads[0].image_existed);
    assert_ne!(uploads[0].image, default);
    assert_ne!(uploads[0].image, downloaded, "wide download should be reshaped");
    assert!(!uploads[0].image.exists());
}

#[tokio::test]
async fn test_failed_download_fails_post_without_default_image() {
    let fx = Fixture::new();
    fx.image("photo.jpg", 300, 300);
    let fetcher = Arc::new(FakeFetcher::failing(FailureKind::NotFound));

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "gone", "image": "https://example.com/gone.jpg", "date": "2024-03-15" },
    ])));
    let publisher = fx
        .publisher(sheet)
        .with_retry_policy(quick_retries(3))
        .with_image_fetcher(Arc::clone(&fetcher));

    let report = publisher.publish_due_posts().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.published, 0);
    assert_eq!(fetcher.urls.lock().len(), 1, "not found is not retried");
    assert!(fx.publisher.uploads.lock().is_empty());

    let messages = fx.notifier.messages.lock();
    assert!(messages[0].starts_with("Failed to publish row 2"));
    assert!(messages[0].contains("download_image"));
}

#[tokio::test]
async fn test_transient_download_failures_are_retried() {
    let fx = Fixture::new();
    let fetcher = Arc::new(FakeFetcher::failing(FailureKind::ServerError));

    let sheet = InMemorySheetSource::new(rows(json!([
        { "content": "flaky host", "image": "https://example.com/a.jpg", "date": "2024-03-15" },
    ])));
    let publisher = fx
        .publisher(sheet)
        .with_retry_policy(quick_retries(2))
        .with_image_fetcher(Arc::clone(&fetcher));

    let report = publisher.publish_due_posts().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(fetcher.urls.lock().len(), 3);
}
