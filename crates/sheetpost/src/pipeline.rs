//! Wiring configuration into a runnable scheduler.

use crate::SheetpostConfig;
use sheetpost_bot::{
    BotMetrics, DryRunPublisher, JsonSheetSource, LogNotifier, Pacing, Publisher, SecurityManager,
};
use sheetpost_error::{ConfigError, SheetpostResult};
use sheetpost_rate_limit::RetryPolicy;
use sheetpost_server::Scheduler;
use std::sync::Arc;
use tracing::{info, warn};

/// Publisher over a JSON sheet export that records instead of uploading.
pub type DryRunTask = Publisher<JsonSheetSource, DryRunPublisher, LogNotifier>;

/// A configured scheduler and the metrics its publisher reports to.
pub struct Pipeline {
    /// Scheduler running the publisher
    pub scheduler: Arc<Scheduler<DryRunTask>>,
    /// Metrics shared with the publisher
    pub metrics: BotMetrics,
}

/// Build the dry-run publishing pipeline from configuration.
///
/// # Errors
///
/// Fails when `bot.rows_file` is unset, when live publishing is requested
/// (no uploading client is bundled), or when any section is invalid.
pub fn build_pipeline(config: &SheetpostConfig) -> SheetpostResult<Pipeline> {
    config.validate()?;

    if !*config.bot.dry_run() {
        warn!("Live publishing requested but no uploading client is bundled");
        return Err(ConfigError::new(
            "bot.dry_run = false needs an external MediaPublisher; only dry runs are bundled",
        )
        .into());
    }

    let rows_file = config
        .bot
        .rows_file()
        .clone()
        .ok_or_else(|| ConfigError::new("bot.rows_file is not set"))?;

    let security = Arc::new(SecurityManager::new(
        config.limits.publish.clone(),
        config.limits.sheets.clone(),
        &config.security,
    ));
    let metrics = BotMetrics::new();

    let publisher = Publisher::new(
        JsonSheetSource::new(&rows_file),
        DryRunPublisher::new(),
        LogNotifier,
    )
    .with_config(&config.bot)
    .with_security(security)
    .with_metrics(metrics.clone())
    .with_retry_policy(RetryPolicy::from_config(&config.retry))
    .with_pacing(Pacing::from_config(&config.pacing)?);

    let scheduler = Scheduler::from_config(publisher, &config.schedule)?;
    let target = config.schedule.target_time()?;
    info!(rows_file = %rows_file.display(), %target, "Publishing pipeline ready");

    Ok(Pipeline {
        scheduler: Arc::new(scheduler),
        metrics,
    })
}
