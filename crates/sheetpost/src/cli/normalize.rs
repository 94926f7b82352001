//! Image normalization command handler.

use sheetpost::{ImageOutcome, SheetpostResult, prepare_image};
use std::path::Path;

/// Handle the `normalize` command
pub fn normalize_image(input: &Path, output_dir: &Path) -> SheetpostResult<()> {
    match prepare_image(input, output_dir) {
        ImageOutcome::Normalized {
            original,
            path,
            dimensions,
        } => println!(
            "{} -> {} ({})",
            original.display(),
            path.display(),
            dimensions
        ),
        ImageOutcome::Unchanged(path) => {
            println!("{} already has an accepted aspect ratio", path.display())
        }
        ImageOutcome::Failed { original, reason } => {
            println!("{}: {}", original.display(), reason);
            return Err(reason.into());
        }
    }
    Ok(())
}
