//! Applying dimension plans to decoded images.

use crate::calculations::{Dimensions, NormalizationPlan, Reshape, plan, plan_fit};
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::debug;

/// Reshape an image into the nearest accepted aspect ratio.
///
/// Compliant images are returned untouched, so normalizing twice gives the
/// same dimensions as normalizing once.
///
/// # Examples
///
/// ```
/// use image::{DynamicImage, GenericImageView};
/// use sheetpost_media::normalize;
///
/// let wide = DynamicImage::new_rgb8(2000, 500);
/// assert_eq!(normalize(wide).dimensions(), (955, 500));
/// ```
pub fn normalize(image: DynamicImage) -> DynamicImage {
    let source = Dimensions::new(image.width(), image.height());
    match plan(source) {
        NormalizationPlan::Unchanged => image,
        NormalizationPlan::Reshape { target, steps } => {
            debug!(%source, %target, output = %steps.output, "Reshaping image");
            apply(image, &steps)
        }
    }
}

/// Reshape an image into exactly `output`, scaling up first if needed.
pub fn fit_to(image: DynamicImage, output: Dimensions) -> DynamicImage {
    let source = Dimensions::new(image.width(), image.height());
    if source == output {
        return image;
    }
    apply(image, &plan_fit(source, output))
}

/// Execute a reshape plan.
pub fn apply(image: DynamicImage, steps: &Reshape) -> DynamicImage {
    let scaled = match steps.scale_to {
        Some(size) => image.resize_exact(size.width, size.height, FilterType::Lanczos3),
        None => image,
    };
    let crop = steps.crop;
    scaled.crop_imm(crop.x, crop.y, crop.width, crop.height)
}
