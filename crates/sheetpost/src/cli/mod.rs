//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the sheetpost binary.

mod commands;
mod normalize;
mod run;
mod status;

pub use commands::{Cli, Commands};
pub use normalize::normalize_image;
pub use run::{run_once, run_scheduler};
pub use status::show_status;
