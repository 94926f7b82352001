//! Where post rows come from.

use crate::Row;
use async_trait::async_trait;
use parking_lot::Mutex;
use sheetpost_error::{FailureKind, PublishError, PublishErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// A spreadsheet of scheduled posts.
#[async_trait]
pub trait SheetSource: Send + Sync + 'static {
    /// Fetch every data row, header excluded.
    async fn fetch_rows(&self) -> Result<Vec<Row>, PublishError>;
}

/// Rows read from a JSON export: an array of objects keyed by column name.
#[derive(Debug, Clone)]
pub struct JsonSheetSource {
    path: PathBuf,
}

impl JsonSheetSource {
    /// Read rows from `path` on every fetch.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The export file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SheetSource for JsonSheetSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_rows(&self) -> Result<Vec<Row>, PublishError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            let failure = match e.kind() {
                std::io::ErrorKind::NotFound => FailureKind::NotFound,
                std::io::ErrorKind::TimedOut => FailureKind::Timeout,
                _ => FailureKind::Other,
            };
            PublishError::request(failure, "fetch_rows", e.to_string())
        })?;

        let rows: Vec<Row> = serde_json::from_str(&text).map_err(|e| {
            PublishError::new(PublishErrorKind::InvalidRow(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;
        debug!(rows = rows.len(), "Loaded sheet export");
        Ok(rows)
    }
}

/// Rows held in memory, replaceable at runtime.
#[derive(Debug, Default)]
pub struct InMemorySheetSource {
    rows: Mutex<Vec<Row>>,
}

impl InMemorySheetSource {
    /// Serve `rows`.
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    /// Replace the served rows.
    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock() = rows;
    }
}

#[async_trait]
impl SheetSource for InMemorySheetSource {
    async fn fetch_rows(&self) -> Result<Vec<Row>, PublishError> {
        Ok(self.rows.lock().clone())
    }
}

#[async_trait]
impl<S: SheetSource> SheetSource for std::sync::Arc<S> {
    async fn fetch_rows(&self) -> Result<Vec<Row>, PublishError> {
        self.as_ref().fetch_rows().await
    }
}
