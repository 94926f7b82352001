//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sheetpost - publish the day's spreadsheet posts at a fixed time
#[derive(Parser, Debug)]
#[command(name = "sheetpost")]
#[command(about = "Publish scheduled spreadsheet posts daily with rate limiting and image normalization", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered over the bundled defaults
    #[arg(short, long, global = true, env = "SHEETPOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daily scheduler until interrupted
    Run {
        /// JSON export of the post spreadsheet
        #[arg(long, env = "SHEETPOST_ROWS")]
        rows: Option<PathBuf>,
    },

    /// Publish today's posts once and exit
    Once {
        /// JSON export of the post spreadsheet
        #[arg(long, env = "SHEETPOST_ROWS")]
        rows: Option<PathBuf>,
    },

    /// Reshape an image to an accepted aspect ratio
    Normalize {
        /// Image to reshape
        input: PathBuf,

        /// Directory for the reshaped copy
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Print the effective configuration as JSON
    Status,
}
