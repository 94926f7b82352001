//! Image normalization for social-media posts.
//!
//! Every published image must match one of three aspect ratios:
//!
//! | Target | Ratio | Accepted when within |
//! |---|---|---|
//! | Square | 1:1 | 0.05 |
//! | Portrait | 4:5 | 0.05 |
//! | Landscape | 1.91:1 | 0.10 |
//!
//! The crate is split the same way as the work itself:
//! - [`calculations`]: pure dimension planning, no pixels involved
//! - [`normalize`](mod@normalize): applies a plan to a decoded image
//! - [`prepare`]: file I/O around the two, reporting an explicit [`ImageOutcome`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calculations;
pub mod normalize;
pub mod prepare;

pub use calculations::{CropRect, Dimensions, ImageTarget, NormalizationPlan, Reshape, plan, plan_fit};
pub use normalize::{apply, fit_to, normalize};
pub use prepare::{
    IMAGE_EXTENSIONS, ImageOutcome, find_default_image, prepare_image, try_prepare_image,
};
