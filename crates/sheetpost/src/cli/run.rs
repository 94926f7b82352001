//! Scheduler command handlers.

use sheetpost::{SheetpostConfig, SheetpostResult, build_pipeline};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

fn with_rows(config: &SheetpostConfig, rows: Option<PathBuf>) -> SheetpostConfig {
    match rows {
        Some(path) => SheetpostConfig {
            bot: config.bot.clone().with_rows_file(path),
            ..config.clone()
        },
        None => config.clone(),
    }
}

/// Handle the `run` command
#[instrument(skip(config))]
pub async fn run_scheduler(config: &SheetpostConfig, rows: Option<PathBuf>) -> SheetpostResult<()> {
    let pipeline = build_pipeline(&with_rows(config, rows))?;
    let scheduler = pipeline.scheduler;

    info!("Scheduler starting. Press Ctrl+C to stop.");
    let listener = scheduler.spawn_signal_listener();
    pipeline.metrics.update_scheduler_status("running");

    let result = scheduler.start().await;
    if result.is_ok() && listener.await.is_err() {
        warn!("Signal listener ended abnormally");
    }
    pipeline
        .metrics
        .update_scheduler_status(scheduler.status().state.to_string());

    let snapshot = pipeline.metrics.snapshot();
    info!(
        published = snapshot.posts_published_total,
        failed = snapshot.posts_failed_total,
        blocked = snapshot.blocked_api_calls,
        health = %pipeline.metrics.health().status,
        "Scheduler finished"
    );
    result?;
    Ok(())
}

/// Handle the `once` command
#[instrument(skip(config))]
pub async fn run_once(config: &SheetpostConfig, rows: Option<PathBuf>) -> SheetpostResult<()> {
    let pipeline = build_pipeline(&with_rows(config, rows))?;
    let report = pipeline.scheduler.run_once().await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| format!("{:?}", report))
    );
    Ok(())
}
