//! Account protection: per-API limiters and suspicious activity tracking.

use crate::SecurityConfig;
use parking_lot::Mutex;
use serde::Serialize;
use sheetpost_rate_limit::{AdvancedRateLimiter, LimiterStats, WindowLimits};
use tokio::time::Instant;
use tracing::{info, warn};

/// Combined limiter and suspicious activity state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityStatus {
    /// Publishing API limiter
    pub publish: LimiterStats,
    /// Spreadsheet API limiter
    pub sheets: LimiterStats,
    /// Suspicious events since the last cooldown
    pub suspicious_activity_count: u32,
    /// Seconds since the last suspicious event
    pub seconds_since_suspicious_activity: Option<u64>,
}

#[derive(Debug, Default)]
struct SuspiciousActivity {
    count: u32,
    last: Option<Instant>,
}

/// Guards both external APIs.
///
/// When suspicious events exceed the threshold, the publishing limiter
/// enters cooldown and the count starts over.
#[derive(Debug)]
pub struct SecurityManager {
    publish: AdvancedRateLimiter,
    sheets: AdvancedRateLimiter,
    threshold: u32,
    suspicious: Mutex<SuspiciousActivity>,
}

impl Default for SecurityManager {
    fn default() -> Self {
        Self::new(
            WindowLimits::publishing(),
            WindowLimits::sheets(),
            &SecurityConfig::default(),
        )
    }
}

impl SecurityManager {
    /// Create a manager with limits for each API.
    pub fn new(publish: WindowLimits, sheets: WindowLimits, config: &SecurityConfig) -> Self {
        Self {
            publish: AdvancedRateLimiter::new("publish", publish),
            sheets: AdvancedRateLimiter::new("sheets", sheets),
            threshold: *config.suspicious_activity_threshold(),
            suspicious: Mutex::new(SuspiciousActivity::default()),
        }
    }

    /// Admit a publishing API call, waiting out minute limits.
    pub async fn check_publish_rate_limit(&self) -> bool {
        self.publish.wait_if_needed().await
    }

    /// Admit a spreadsheet API call, waiting out minute limits.
    pub async fn check_sheets_rate_limit(&self) -> bool {
        self.sheets.wait_if_needed().await
    }

    /// The publishing API limiter.
    pub fn publish_limiter(&self) -> &AdvancedRateLimiter {
        &self.publish
    }

    /// The spreadsheet API limiter.
    pub fn sheets_limiter(&self) -> &AdvancedRateLimiter {
        &self.sheets
    }

    /// Record a suspicious event.
    ///
    /// Returns `true` when this event tripped the publishing cooldown.
    pub fn report_suspicious_activity(&self, activity: &str, details: &str) -> bool {
        let count = {
            let mut state = self.suspicious.lock();
            state.count += 1;
            state.last = Some(Instant::now());
            state.count
        };
        warn!(activity, details, count, threshold = self.threshold, "Suspicious activity detected");

        if count <= self.threshold {
            return false;
        }

        self.publish
            .trigger_cooldown("Too many suspicious activities");
        self.suspicious.lock().count = 0;
        info!("Suspicious activity count reset after cooldown");
        true
    }

    /// Current limiter stats and suspicious activity counters.
    pub fn security_status(&self) -> SecurityStatus {
        let suspicious = self.suspicious.lock();
        SecurityStatus {
            publish: self.publish.get_stats(),
            sheets: self.sheets.get_stats(),
            suspicious_activity_count: suspicious.count,
            seconds_since_suspicious_activity: suspicious.last.map(|t| t.elapsed().as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_after_threshold_exceeded() {
        let manager = SecurityManager::new(
            WindowLimits::publishing(),
            WindowLimits::sheets(),
            &SecurityConfig::new(2),
        );

        assert!(!manager.report_suspicious_activity("publish_failure", "row 2"));
        assert!(!manager.report_suspicious_activity("publish_failure", "row 3"));
        assert!(manager.check_publish_rate_limit().await);

        assert!(manager.report_suspicious_activity("publish_failure", "row 4"));
        let status = manager.security_status();
        assert_eq!(status.suspicious_activity_count, 0);
        assert!(status.publish.cooldown_active);
        assert_eq!(status.publish.cooldown_remaining, 600);
        assert!(!status.sheets.cooldown_active);

        assert!(!manager.check_publish_rate_limit().await);
        assert!(manager.check_sheets_rate_limit().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_tracks_last_event() {
        let manager = SecurityManager::default();
        assert_eq!(manager.security_status().seconds_since_suspicious_activity, None);

        manager.report_suspicious_activity("invalid_row", "row 7");
        tokio::time::advance(std::time::Duration::from_secs(42)).await;

        let status = manager.security_status();
        assert_eq!(status.suspicious_activity_count, 1);
        assert_eq!(status.seconds_since_suspicious_activity, Some(42));
    }
}
