//! Tests for fixed-interval pacing.

use sheetpost_rate_limit::RateLimiter;
use std::time::{Duration, Instant};

#[test]
fn test_min_interval_derived_from_rate() {
    let limiter = RateLimiter::new(30).unwrap();
    assert_eq!(limiter.min_interval(), Duration::from_secs(2));
    assert!(limiter.last_call().is_none());
}

#[test]
fn test_zero_rate_rejected() {
    let err = RateLimiter::new(0).unwrap_err();
    assert!(err.message.contains("positive"));
}

#[tokio::test]
async fn test_consecutive_calls_spaced_by_min_interval() {
    // 1200 calls per minute is one call every 50ms
    let limiter = RateLimiter::named("pacing", 1200).unwrap();
    let tolerance = Duration::from_millis(5);

    let mut grants = Vec::new();
    for _ in 0..4 {
        limiter.wait_if_needed().await;
        grants.push(Instant::now());
    }

    for pair in grants.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap + tolerance >= limiter.min_interval(),
            "calls only {:?} apart",
            gap
        );
    }
    assert!(limiter.last_call().is_some());
}

#[tokio::test]
async fn test_clones_share_quota() {
    let limiter = RateLimiter::new(1200).unwrap();
    let other = limiter.clone();

    let start = Instant::now();
    limiter.wait_if_needed().await;
    other.wait_if_needed().await;
    assert!(start.elapsed() + Duration::from_millis(5) >= limiter.min_interval());
}
