//! Pure dimension planning.
//!
//! Nothing here touches pixels or files, so every rule about which target
//! an image lands in and how it gets there is testable with plain numbers.

use serde::Serialize;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height, or `None` for an empty image.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }

    /// Whether both sides are at least as large as `other`'s.
    pub fn covers(&self, other: Dimensions) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The three accepted aspect ratios.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageTarget {
    /// 1:1
    Square,
    /// 4:5
    Portrait,
    /// 1.91:1
    Landscape,
}

impl ImageTarget {
    /// Nominal width / height ratio.
    pub fn ratio(&self) -> f64 {
        match self {
            ImageTarget::Square => 1.0,
            ImageTarget::Portrait => 0.8,
            ImageTarget::Landscape => 1.91,
        }
    }

    /// Maximum distance from [`ratio`](Self::ratio) still accepted as-is.
    pub fn tolerance(&self) -> f64 {
        match self {
            ImageTarget::Square | ImageTarget::Portrait => 0.05,
            ImageTarget::Landscape => 0.10,
        }
    }

    /// Whether `ratio` is strictly within tolerance of this target.
    pub fn accepts(&self, ratio: f64) -> bool {
        (ratio - self.ratio()).abs() < self.tolerance()
    }

    /// Target bucket for a non-compliant ratio.
    ///
    /// Wider than 1.5 becomes landscape, narrower than 0.9 becomes portrait,
    /// everything between becomes square.
    pub fn for_aspect_ratio(ratio: f64) -> Self {
        if ratio > 1.5 {
            ImageTarget::Landscape
        } else if ratio < 0.9 {
            ImageTarget::Portrait
        } else {
            ImageTarget::Square
        }
    }

    /// Output size when reshaping `source` into this target.
    ///
    /// Landscape keeps the height, portrait keeps the width and square keeps
    /// the shorter side. Fractional pixels are dropped.
    pub fn output_for(&self, source: Dimensions) -> Dimensions {
        match self {
            ImageTarget::Landscape => {
                let width = u64::from(source.height) * 191 / 100;
                Dimensions::new(clamp_u32(width), source.height)
            }
            ImageTarget::Portrait => {
                let height = u64::from(source.width) * 5 / 4;
                Dimensions::new(source.width, clamp_u32(height))
            }
            ImageTarget::Square => {
                let side = source.width.min(source.height);
                Dimensions::new(side, side)
            }
        }
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Whether an image of this size can be published without reshaping.
///
/// # Examples
///
/// ```
/// use sheetpost_media::{Dimensions, calculations::is_compliant};
///
/// assert!(is_compliant(Dimensions::new(1000, 1000)));
/// assert!(is_compliant(Dimensions::new(1080, 1350)));
/// assert!(!is_compliant(Dimensions::new(2000, 500)));
/// ```
pub fn is_compliant(source: Dimensions) -> bool {
    match source.aspect_ratio() {
        Some(ratio) => [
            ImageTarget::Square,
            ImageTarget::Portrait,
            ImageTarget::Landscape,
        ]
        .iter()
        .any(|target| target.accepts(ratio)),
        None => false,
    }
}

/// Region to keep, in the coordinates of the (possibly scaled) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Kept width
    pub width: u32,
    /// Kept height
    pub height: u32,
}

/// Steps turning a source image into an exact output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reshape {
    /// Size to resample to before cropping, when the source is too small
    pub scale_to: Option<Dimensions>,
    /// Centered crop applied after any scaling
    pub crop: CropRect,
    /// Final size
    pub output: Dimensions,
}

/// What normalization will do to an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NormalizationPlan {
    /// Already compliant, or empty
    Unchanged,
    /// Needs reshaping into `target`
    Reshape {
        /// Chosen aspect-ratio bucket
        target: ImageTarget,
        /// Scale and crop steps
        steps: Reshape,
    },
}

/// Plan normalization of an image with the given size.
///
/// # Examples
///
/// ```
/// use sheetpost_media::{Dimensions, ImageTarget, NormalizationPlan, plan};
///
/// match plan(Dimensions::new(2000, 500)) {
///     NormalizationPlan::Reshape { target, steps } => {
///         assert_eq!(target, ImageTarget::Landscape);
///         assert_eq!(steps.output, Dimensions::new(955, 500));
///         assert!(steps.scale_to.is_none());
///     }
///     NormalizationPlan::Unchanged => unreachable!(),
/// }
/// ```
pub fn plan(source: Dimensions) -> NormalizationPlan {
    let Some(ratio) = source.aspect_ratio() else {
        return NormalizationPlan::Unchanged;
    };
    if is_compliant(source) {
        return NormalizationPlan::Unchanged;
    }

    let target = ImageTarget::for_aspect_ratio(ratio);
    let output = target.output_for(source);
    NormalizationPlan::Reshape {
        target,
        steps: plan_fit(source, output),
    }
}

/// Plan reshaping `source` into exactly `output`.
///
/// A source that covers the output is center-cropped. A smaller source is
/// first scaled uniformly by the larger of the two required factors, so both
/// sides meet or exceed the output, then center-cropped.
pub fn plan_fit(source: Dimensions, output: Dimensions) -> Reshape {
    if source.covers(output) || source.width == 0 || source.height == 0 {
        return Reshape {
            scale_to: None,
            crop: centered(source, output),
            output,
        };
    }

    let scale_x = f64::from(output.width) / f64::from(source.width);
    let scale_y = f64::from(output.height) / f64::from(source.height);
    let scale = scale_x.max(scale_y);

    let scaled = Dimensions::new(
        scaled_side(source.width, scale).max(output.width),
        scaled_side(source.height, scale).max(output.height),
    );

    Reshape {
        scale_to: Some(scaled),
        crop: centered(scaled, output),
        output,
    }
}

fn scaled_side(side: u32, scale: f64) -> u32 {
    let value = (f64::from(side) * scale).round();
    if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value as u32
    }
}

fn centered(outer: Dimensions, inner: Dimensions) -> CropRect {
    let width = inner.width.min(outer.width);
    let height = inner.height.min(outer.height);
    CropRect {
        x: (outer.width - width) / 2,
        y: (outer.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_selection() {
        assert_eq!(ImageTarget::for_aspect_ratio(1.51), ImageTarget::Landscape);
        assert_eq!(ImageTarget::for_aspect_ratio(1.5), ImageTarget::Square);
        assert_eq!(ImageTarget::for_aspect_ratio(0.9), ImageTarget::Square);
        assert_eq!(ImageTarget::for_aspect_ratio(0.89), ImageTarget::Portrait);
    }

    #[test]
    fn test_tolerance_is_strict() {
        assert!(ImageTarget::Square.accepts(1.04));
        assert!(!ImageTarget::Square.accepts(1.06));
        assert!(ImageTarget::Landscape.accepts(1.82));
        assert!(!ImageTarget::Landscape.accepts(1.80));
    }

    #[test]
    fn test_portrait_output_keeps_width() {
        let out = ImageTarget::Portrait.output_for(Dimensions::new(600, 1200));
        assert_eq!(out, Dimensions::new(600, 750));
    }

    #[test]
    fn test_square_output_uses_shorter_side() {
        let out = ImageTarget::Square.output_for(Dimensions::new(1300, 1000));
        assert_eq!(out, Dimensions::new(1000, 1000));
    }

    #[test]
    fn test_landscape_between_thresholds_needs_upscale() {
        // 1.6:1 lands in landscape but is narrower than 1.91:1
        let NormalizationPlan::Reshape { target, steps } = plan(Dimensions::new(800, 500)) else {
            panic!("800x500 should be reshaped");
        };
        assert_eq!(target, ImageTarget::Landscape);
        assert_eq!(steps.output, Dimensions::new(955, 500));
        let scaled = steps.scale_to.unwrap();
        assert!(scaled.covers(steps.output));
        assert_eq!(steps.crop.width, 955);
        assert_eq!(steps.crop.height, 500);
    }

    #[test]
    fn test_fit_small_square_upscales() {
        let steps = plan_fit(Dimensions::new(100, 100), Dimensions::new(1080, 1080));
        assert_eq!(steps.scale_to, Some(Dimensions::new(1080, 1080)));
        assert_eq!(
            steps.crop,
            CropRect {
                x: 0,
                y: 0,
                width: 1080,
                height: 1080
            }
        );
    }

    #[test]
    fn test_empty_image_unchanged() {
        assert_eq!(plan(Dimensions::new(0, 100)), NormalizationPlan::Unchanged);
    }
}
