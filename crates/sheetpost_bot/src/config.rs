//! Publishing pipeline configuration.

use serde::{Deserialize, Serialize};
use sheetpost_error::ConfigError;
use std::path::PathBuf;

/// The `[bot]` configuration section.
///
/// # Example
///
/// ```toml
/// [bot]
/// rows_file = "posts.json"
/// default_images_dir = "images"
/// work_dir = "tmp"
/// dry_run = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct BotConfig {
    /// JSON export of the post spreadsheet
    #[serde(default)]
    rows_file: Option<PathBuf>,

    /// Directory searched when a post names no usable image
    #[serde(default = "default_images_dir")]
    default_images_dir: PathBuf,

    /// Directory for reshaped images
    #[serde(default = "default_work_dir")]
    work_dir: PathBuf,

    /// Record posts instead of uploading them
    #[serde(default = "default_dry_run")]
    dry_run: bool,
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_dry_run() -> bool {
    true
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            rows_file: None,
            default_images_dir: default_images_dir(),
            work_dir: default_work_dir(),
            dry_run: default_dry_run(),
        }
    }
}

impl BotConfig {
    /// Override the rows export.
    pub fn with_rows_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rows_file = Some(path.into());
        self
    }

    /// Reject empty directory paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(ConfigError::new("bot.work_dir must not be empty"));
        }
        if self.default_images_dir.as_os_str().is_empty() {
            return Err(ConfigError::new("bot.default_images_dir must not be empty"));
        }
        Ok(())
    }
}

/// The `[security]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct SecurityConfig {
    /// Suspicious events tolerated before the publish limiter cools down
    #[serde(default = "default_suspicious_threshold")]
    suspicious_activity_threshold: u32,
}

fn default_suspicious_threshold() -> u32 {
    5
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            suspicious_activity_threshold: default_suspicious_threshold(),
        }
    }
}

impl SecurityConfig {
    /// Create a config with the given threshold.
    pub fn new(suspicious_activity_threshold: u32) -> Self {
        Self {
            suspicious_activity_threshold,
        }
    }
}
