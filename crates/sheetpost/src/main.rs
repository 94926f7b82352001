//! Sheetpost CLI binary.
//!
//! This binary provides command-line access to Sheetpost:
//! - Run the daily publishing scheduler
//! - Publish today's posts once
//! - Normalize a single image
//! - Inspect the effective configuration

use clap::Parser;
use sheetpost::{SheetpostConfig, init_observability};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, normalize_image, run_once, run_scheduler, show_status};

    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SheetpostConfig::from_file(path)?,
        None => SheetpostConfig::load()?,
    };

    let mut observability = config.observability.clone();
    if cli.verbose {
        observability = observability.with_log_level("debug");
    }
    init_observability(&observability)?;

    // Execute the requested command
    match cli.command {
        Commands::Run { rows } => run_scheduler(&config, rows).await?,
        Commands::Once { rows } => run_once(&config, rows).await?,
        Commands::Normalize { input, output_dir } => normalize_image(&input, &output_dir)?,
        Commands::Status => show_status(&config)?,
    }

    Ok(())
}
