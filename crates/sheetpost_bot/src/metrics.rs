//! Metrics collection for the publishing pipeline.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Publish outcomes older than this no longer count toward health.
const HEALTH_WINDOW: Duration = Duration::from_secs(24 * 3600);

/// Failure share above which publishing counts as unhealthy.
const FAILURE_RATE_LIMIT: f64 = 0.5;

/// Scheduler states that count as healthy.
const HEALTHY_SCHEDULER_STATES: &[&str] = &["running", "idle"];

/// External API a call was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ApiKind {
    /// The photo-sharing API
    Publish,
    /// The spreadsheet API
    Sheets,
}

/// Overall health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    /// No issues
    Healthy,
    /// One or two issues
    Degraded,
    /// More than two issues
    Unhealthy,
}

/// Health verdict with the issues behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Verdict
    pub status: HealthStatus,
    /// Issues found
    pub issues: Vec<String>,
    /// Seconds since the collector was created
    pub uptime_seconds: u64,
}

/// Metrics collector for publishing.
#[derive(Debug, Clone)]
pub struct BotMetrics {
    inner: Arc<BotMetricsInner>,
}

#[derive(Debug)]
struct BotMetricsInner {
    started: Instant,

    posts_published: AtomicU64,
    posts_failed: AtomicU64,
    publish_api_calls: AtomicU64,
    sheets_api_calls: AtomicU64,
    blocked_api_calls: AtomicU64,

    last_success: Mutex<Option<Instant>>,
    last_failure: Mutex<Option<Instant>>,
    // (when, succeeded)
    recent_outcomes: Mutex<VecDeque<(Instant, bool)>>,
    scheduler_status: Mutex<String>,
}

impl Default for BotMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BotMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BotMetricsInner {
                started: Instant::now(),
                posts_published: AtomicU64::new(0),
                posts_failed: AtomicU64::new(0),
                publish_api_calls: AtomicU64::new(0),
                sheets_api_calls: AtomicU64::new(0),
                blocked_api_calls: AtomicU64::new(0),
                last_success: Mutex::new(None),
                last_failure: Mutex::new(None),
                recent_outcomes: Mutex::new(VecDeque::new()),
                scheduler_status: Mutex::new("stopped".to_string()),
            }),
        }
    }

    /// Records a published post.
    pub fn record_post_published(&self) {
        let total = self.inner.posts_published.fetch_add(1, Ordering::Relaxed) + 1;
        self.record_outcome(true);
        info!(total_published = total, "Post publication recorded");
    }

    /// Records a failed post.
    pub fn record_post_failed(&self) {
        let total = self.inner.posts_failed.fetch_add(1, Ordering::Relaxed) + 1;
        self.record_outcome(false);
        info!(total_failed = total, "Post failure recorded");
    }

    fn record_outcome(&self, succeeded: bool) {
        let now = Instant::now();
        let slot = if succeeded {
            &self.inner.last_success
        } else {
            &self.inner.last_failure
        };
        *slot.lock() = Some(now);

        let mut recent = self.inner.recent_outcomes.lock();
        recent.push_back((now, succeeded));
        prune(&mut recent, now);
    }

    /// Records an API call, counting it as blocked when the limiter refused it.
    pub fn record_api_call(&self, api: ApiKind, blocked: bool) {
        let counter = match api {
            ApiKind::Publish => &self.inner.publish_api_calls,
            ApiKind::Sheets => &self.inner.sheets_api_calls,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if blocked {
            self.inner.blocked_api_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records the scheduler's state, as shown by its `Display`.
    pub fn update_scheduler_status(&self, status: impl Into<String>) {
        let status = status.into();
        let mut current = self.inner.scheduler_status.lock();
        if *current != status {
            info!(old_status = %current, new_status = %status, "Scheduler status changed");
            *current = status;
        }
    }

    /// Gets published post count.
    pub fn posts_published(&self) -> u64 {
        self.inner.posts_published.load(Ordering::Relaxed)
    }

    /// Gets failed post count.
    pub fn posts_failed(&self) -> u64 {
        self.inner.posts_failed.load(Ordering::Relaxed)
    }

    /// Gets blocked API call count.
    pub fn blocked_api_calls(&self) -> u64 {
        self.inner.blocked_api_calls.load(Ordering::Relaxed)
    }

    /// Published and failed counts within the health window.
    fn recent_counts(&self) -> (u64, u64) {
        let mut recent = self.inner.recent_outcomes.lock();
        prune(&mut recent, Instant::now());
        recent.iter().fold((0, 0), |(ok, failed), (_, succeeded)| {
            if *succeeded {
                (ok + 1, failed)
            } else {
                (ok, failed + 1)
            }
        })
    }

    /// Creates a serializable snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (published_24h, failed_24h) = self.recent_counts();
        MetricsSnapshot {
            posts_published_total: self.posts_published(),
            posts_failed_total: self.posts_failed(),
            posts_published_last_24h: published_24h,
            posts_failed_last_24h: failed_24h,
            seconds_since_success: self.inner.last_success.lock().map(|t| t.elapsed().as_secs()),
            seconds_since_failure: self.inner.last_failure.lock().map(|t| t.elapsed().as_secs()),
            scheduler_status: self.inner.scheduler_status.lock().clone(),
            publish_api_calls: self.inner.publish_api_calls.load(Ordering::Relaxed),
            sheets_api_calls: self.inner.sheets_api_calls.load(Ordering::Relaxed),
            blocked_api_calls: self.blocked_api_calls(),
        }
    }

    /// Derive health from scheduler state and recent failure rate.
    pub fn health(&self) -> HealthReport {
        let snapshot = self.snapshot();
        let mut issues = Vec::new();

        if !HEALTHY_SCHEDULER_STATES.contains(&snapshot.scheduler_status.as_str()) {
            issues.push("Scheduler not running".to_string());
        }

        let (ok, failed) = (
            snapshot.posts_published_last_24h,
            snapshot.posts_failed_last_24h,
        );
        if ok > 0 && failed > 0 && failed as f64 / (ok + failed) as f64 > FAILURE_RATE_LIMIT {
            issues.push("High failure rate".to_string());
        }

        let status = match issues.len() {
            0 => HealthStatus::Healthy,
            1..=2 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        };

        HealthReport {
            status,
            issues,
            uptime_seconds: self.inner.started.elapsed().as_secs(),
        }
    }
}

fn prune(recent: &mut VecDeque<(Instant, bool)>, now: Instant) {
    while let Some((at, _)) = recent.front() {
        if now.saturating_duration_since(*at) > HEALTH_WINDOW {
            recent.pop_front();
        } else {
            break;
        }
    }
}

/// Serializable snapshot of publishing metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Posts published since start
    pub posts_published_total: u64,
    /// Posts failed since start
    pub posts_failed_total: u64,
    /// Posts published in the last 24 hours
    pub posts_published_last_24h: u64,
    /// Posts failed in the last 24 hours
    pub posts_failed_last_24h: u64,
    /// Seconds since the last published post
    pub seconds_since_success: Option<u64>,
    /// Seconds since the last failed post
    pub seconds_since_failure: Option<u64>,
    /// Last reported scheduler state
    pub scheduler_status: String,
    /// Calls to the publishing API
    pub publish_api_calls: u64,
    /// Calls to the spreadsheet API
    pub sheets_api_calls: u64,
    /// Calls refused by rate limiters
    pub blocked_api_calls: u64,
}
