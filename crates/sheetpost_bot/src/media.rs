//! Where posts go.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use sheetpost_error::{FailureKind, PublishError};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Base of public post links.
const POST_URL_BASE: &str = "https://www.instagram.com/p/";

/// A published photo post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedMedia {
    /// Platform media id
    pub id: String,
    /// Short code used in public links
    pub code: String,
}

impl PublishedMedia {
    /// Public link to the post.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetpost_bot::PublishedMedia;
    ///
    /// let media = PublishedMedia { id: "1".into(), code: "Cx9".into() };
    /// assert_eq!(media.url(), "https://www.instagram.com/p/Cx9/");
    /// ```
    pub fn url(&self) -> String {
        format!("{}{}/", POST_URL_BASE, self.code)
    }
}

/// A photo-sharing account that accepts an image and a caption.
#[async_trait]
pub trait MediaPublisher: Send + Sync + 'static {
    /// Upload `image` with `caption`.
    async fn publish(&self, image: &Path, caption: &str) -> Result<PublishedMedia, PublishError>;
}

/// Logs what would be published and records it instead of uploading.
#[derive(Debug, Default)]
pub struct DryRunPublisher {
    published: Mutex<Vec<(PathBuf, String)>>,
}

impl DryRunPublisher {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Image and caption of every accepted publish, in order.
    pub fn published(&self) -> Vec<(PathBuf, String)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl MediaPublisher for DryRunPublisher {
    #[instrument(skip(self, caption), fields(image = %image.display()))]
    async fn publish(&self, image: &Path, caption: &str) -> Result<PublishedMedia, PublishError> {
        if !tokio::fs::try_exists(image).await.unwrap_or(false) {
            return Err(PublishError::request(
                FailureKind::NotFound,
                "publish",
                format!("image {} does not exist", image.display()),
            ));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        let code = id[..11].to_string();
        info!(caption_chars = caption.chars().count(), %code, "Dry run: post not uploaded");
        self.published
            .lock()
            .push((image.to_path_buf(), caption.to_string()));
        Ok(PublishedMedia { id, code })
    }
}

#[async_trait]
impl<P: MediaPublisher> MediaPublisher for std::sync::Arc<P> {
    async fn publish(&self, image: &Path, caption: &str) -> Result<PublishedMedia, PublishError> {
        self.as_ref().publish(image, caption).await
    }
}
