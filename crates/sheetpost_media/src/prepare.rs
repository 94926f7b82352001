//! File-level image preparation.
//!
//! Decoding, normalizing and re-encoding a post image, with the outcome
//! reported as an explicit [`ImageOutcome`] so callers choose their own
//! fallback.

use crate::calculations::{Dimensions, NormalizationPlan, plan};
use crate::normalize::apply;
use image::codecs::jpeg::JpegEncoder;
use sheetpost_error::{ImageError, ImageErrorKind};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// JPEG quality of reshaped images.
const JPEG_QUALITY: u8 = 95;

/// File names tried, in order, when looking for a default image.
const DEFAULT_IMAGE_NAMES: &[&str] = &[
    "photo.jpg",
    "photo.jpeg",
    "photo.png",
    "image.jpg",
    "image.jpeg",
    "image.png",
    "default.jpg",
];

/// Extensions treated as images when scanning a directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Result of preparing an image file for publishing.
#[derive(Debug)]
pub enum ImageOutcome {
    /// A reshaped copy was written
    Normalized {
        /// Source file
        original: PathBuf,
        /// Reshaped JPEG, owned by the caller
        path: PathBuf,
        /// Size of the reshaped image
        dimensions: Dimensions,
    },
    /// The source already has an accepted aspect ratio
    Unchanged(PathBuf),
    /// The source could not be processed
    Failed {
        /// Source file
        original: PathBuf,
        /// What went wrong
        reason: ImageError,
    },
}

impl ImageOutcome {
    /// The file to publish: the reshaped copy, or the original otherwise.
    pub fn usable_path(&self) -> &Path {
        match self {
            ImageOutcome::Normalized { path, .. } => path,
            ImageOutcome::Unchanged(original) => original,
            ImageOutcome::Failed { original, .. } => original,
        }
    }

    /// The reshaped copy, if one was written and must be removed after use.
    pub fn temporary_file(&self) -> Option<&Path> {
        match self {
            ImageOutcome::Normalized { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether preparation failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, ImageOutcome::Failed { .. })
    }
}

/// Prepare an image, folding errors into [`ImageOutcome::Failed`].
///
/// Reshaped images are written into `work_dir` as
/// `sheetpost_processed_<id>.jpg`.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn prepare_image(source: &Path, work_dir: &Path) -> ImageOutcome {
    match try_prepare_image(source, work_dir) {
        Ok(outcome) => outcome,
        Err(reason) => {
            warn!(error = %reason, "Image preparation failed");
            ImageOutcome::Failed {
                original: source.to_path_buf(),
                reason,
            }
        }
    }
}

/// Prepare an image, returning errors to the caller.
///
/// # Errors
///
/// Returns `ImageError` if the source cannot be decoded or the reshaped
/// copy cannot be written.
pub fn try_prepare_image(source: &Path, work_dir: &Path) -> Result<ImageOutcome, ImageError> {
    let dimensions = image::image_dimensions(source).map_err(|e| {
        ImageError::new(ImageErrorKind::Open {
            path: source.to_path_buf(),
            message: e.to_string(),
        })
    })?;
    let size = Dimensions::new(dimensions.0, dimensions.1);
    if size.width == 0 || size.height == 0 {
        return Err(ImageError::new(ImageErrorKind::Empty {
            width: size.width,
            height: size.height,
        }));
    }

    let NormalizationPlan::Reshape { target, steps } = plan(size) else {
        debug!(%size, "Image already has an accepted aspect ratio");
        return Ok(ImageOutcome::Unchanged(source.to_path_buf()));
    };

    let decoded = image::open(source).map_err(|e| {
        ImageError::new(ImageErrorKind::Open {
            path: source.to_path_buf(),
            message: e.to_string(),
        })
    })?;
    let reshaped = apply(decoded, &steps);

    let path = work_dir.join(processed_file_name());
    write_jpeg(&reshaped, &path)?;

    info!(
        from = %size,
        to = %steps.output,
        %target,
        path = %path.display(),
        "Adjusted image aspect ratio"
    );

    Ok(ImageOutcome::Normalized {
        original: source.to_path_buf(),
        path,
        dimensions: steps.output,
    })
}

fn processed_file_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("sheetpost_processed_{}.jpg", &id[..8])
}

/// Encode as RGB JPEG, dropping any alpha channel.
fn write_jpeg(image: &image::DynamicImage, path: &Path) -> Result<(), ImageError> {
    let file = File::create(path).map_err(|e| {
        ImageError::new(ImageErrorKind::Create {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| ImageError::new(ImageErrorKind::Encode(e.to_string())))
}

/// Find a fallback image in `dir`.
///
/// Well-known names are tried first, then the first file (by name) with an
/// image extension.
pub fn find_default_image(dir: &Path) -> Option<PathBuf> {
    if let Some(found) = DEFAULT_IMAGE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
    {
        info!(path = %found.display(), "Found default image");
        return Some(found);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    candidates.sort();

    match candidates.into_iter().next() {
        Some(found) => {
            info!(path = %found.display(), "Found image in directory");
            Some(found)
        }
        None => {
            warn!(dir = %dir.display(), "No image found");
            None
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
