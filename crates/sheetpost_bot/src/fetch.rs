//! Downloading remote post images.

use async_trait::async_trait;
use sheetpost_error::{FailureKind, PublishError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Prefix of every image file Sheetpost writes to its work directory.
pub const WORK_FILE_PREFIX: &str = "sheetpost_processed_";

/// Direct download endpoint for shared Drive files.
const DRIVE_DOWNLOAD_BASE: &str = "https://drive.google.com/uc?export=download&id=";

/// Browser-like user agent sent with downloads.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether an image source names a remote URL rather than a local path.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Rewrite a Drive share link (`.../d/<id>/view`) into a direct download link.
///
/// Other URLs are returned unchanged.
///
/// # Examples
///
/// ```
/// use sheetpost_bot::drive_direct_url;
///
/// assert_eq!(
///     drive_direct_url("https://drive.google.com/file/d/1AbC_x-9/view?usp=sharing"),
///     "https://drive.google.com/uc?export=download&id=1AbC_x-9"
/// );
/// assert_eq!(drive_direct_url("https://example.com/a.jpg"), "https://example.com/a.jpg");
/// ```
pub fn drive_direct_url(url: &str) -> String {
    let Some(start) = url.find("/d/").map(|i| i + 3) else {
        return url.to_string();
    };
    let id: String = url[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if id.is_empty() {
        return url.to_string();
    }
    format!("{}{}", DRIVE_DOWNLOAD_BASE, id)
}

/// Fresh file name in the work directory.
pub fn work_file_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}.jpg", WORK_FILE_PREFIX, &id[..8])
}

/// Downloads remote images into a local directory.
#[async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    /// Download `url` into `dest_dir` and return the written file.
    ///
    /// The caller owns the file and removes it after use.
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, PublishError>;
}

/// Fetches images over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpImageFetcher {
    /// Fetch through an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DOWNLOAD_TIMEOUT,
        }
    }

    /// Limit each download to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn classify(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else if let Some(status) = error.status() {
        classify_status(status)
    } else if error.is_connect() || error.is_request() || error.is_body() {
        FailureKind::Network
    } else {
        FailureKind::Other
    }
}

fn classify_status(status: reqwest::StatusCode) -> FailureKind {
    match status.as_u16() {
        429 => FailureKind::Throttled,
        401 | 403 => FailureKind::Authentication,
        404 | 410 => FailureKind::NotFound,
        500..=599 => FailureKind::ServerError,
        _ => FailureKind::InvalidInput,
    }
}

fn download_error(error: &reqwest::Error, url: &str) -> PublishError {
    PublishError::request(
        classify(error),
        "download_image",
        format!("{}: {}", url, error),
    )
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(skip(self, dest_dir), fields(dest = %dest_dir.display()))]
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, PublishError> {
        let direct = drive_direct_url(url);
        if direct != url {
            debug!(%direct, "Rewrote Drive share link");
        }

        let mut response = self
            .client
            .get(&direct)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| download_error(&e, url))?;

        let path = dest_dir.join(work_file_name());
        let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
            PublishError::request(
                FailureKind::Other,
                "download_image",
                format!("cannot create {}: {}", path.display(), e),
            )
        })?;

        let mut bytes = 0usize;
        let written: Result<(), PublishError> = async {
            while let Some(chunk) = response.chunk().await.map_err(|e| download_error(&e, url))? {
                bytes += chunk.len();
                file.write_all(&chunk).await.map_err(|e| {
                    PublishError::request(FailureKind::Other, "download_image", e.to_string())
                })?;
            }
            file.flush().await.map_err(|e| {
                PublishError::request(FailureKind::Other, "download_image", e.to_string())
            })
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(remove) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %remove, "Cannot remove partial download");
            }
            return Err(e);
        }

        info!(path = %path.display(), bytes, "Downloaded image");
        Ok(path)
    }
}

#[async_trait]
impl<F: ImageFetcher> ImageFetcher for std::sync::Arc<F> {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, PublishError> {
        self.as_ref().fetch(url, dest_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_links_without_id_unchanged() {
        let url = "https://drive.google.com/d/?x=1";
        assert_eq!(drive_direct_url(url), url);
    }

    #[test]
    fn test_drive_open_link_rewritten() {
        assert_eq!(
            drive_direct_url("https://drive.google.com/file/d/XYZ123/edit"),
            "https://drive.google.com/uc?export=download&id=XYZ123"
        );
    }

    #[test]
    fn test_remote_detection() {
        assert!(is_remote("https://example.com/a.png"));
        assert!(is_remote("http://example.com/a.png"));
        assert!(!is_remote("images/a.png"));
        assert!(!is_remote("ftp://example.com/a.png"));
    }

    #[test]
    fn test_work_file_names_are_unique_and_prefixed() {
        let first = work_file_name();
        let second = work_file_name();
        assert_ne!(first, second);
        assert!(first.starts_with(WORK_FILE_PREFIX));
        assert!(first.ends_with(".jpg"));
        assert_eq!(first.len(), WORK_FILE_PREFIX.len() + 8 + 4);
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), FailureKind::Throttled);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), FailureKind::NotFound);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), FailureKind::ServerError);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), FailureKind::Authentication);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), FailureKind::InvalidInput);
    }
}
