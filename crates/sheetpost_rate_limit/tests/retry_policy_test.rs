//! Tests for retry with backoff.

use sheetpost_error::{FailureKind, PublishError, RetryableError};
use sheetpost_rate_limit::{RetryConfig, RetryPolicy, RetryPolicyBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

fn fast_policy(max_retries: usize) -> RetryPolicy {
    RetryPolicyBuilder::default()
        .max_retries(max_retries)
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(1))
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_retryable_failures_then_success() {
    let policy = fast_policy(3);
    let calls = Arc::new(AtomicUsize::new(0));

    let result = policy
        .run("flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(PublishError::request(FailureKind::Timeout, "flaky", "timed out"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_success_on_last_permitted_attempt() {
    let policy = fast_policy(2);
    let calls = Arc::new(AtomicUsize::new(0));

    let result = policy
        .run("flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(PublishError::request(FailureKind::Throttled, "flaky", "please wait"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_failure_propagates_immediately() {
    let policy = fast_policy(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let result: Result<(), PublishError> = policy
        .run("login", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PublishError::request(FailureKind::Authentication, "login", "bad password")) }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::Authentication);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_last_failure() {
    let policy = fast_policy(2);
    let calls = Arc::new(AtomicUsize::new(0));

    let result: Result<(), PublishError> = policy
        .run("upload", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                Err(PublishError::request(
                    FailureKind::ConnectionReset,
                    "upload",
                    format!("reset on attempt {}", n),
                ))
            }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("reset on attempt 3"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unjittered_delays_follow_exponential_schedule() {
    let policy = RetryPolicyBuilder::default()
        .max_retries(3usize)
        .jitter(false)
        .build()
        .unwrap();
    let start = Instant::now();

    let result: Result<(), PublishError> = policy
        .run("slow", || async {
            Err(PublishError::request(FailureKind::Network, "slow", "unreachable"))
        })
        .await;

    assert!(result.is_err());
    // 1s + 2s + 4s between four attempts
    assert_eq!(start.elapsed(), Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_custom_retryable_set_overrides_defaults() {
    let policy = fast_policy(3).with_retryable([FailureKind::NotFound]);
    assert!(policy.retries(FailureKind::NotFound));
    assert!(!policy.retries(FailureKind::Timeout));

    let calls = Arc::new(AtomicUsize::new(0));
    let result: Result<(), PublishError> = policy
        .run("fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PublishError::request(FailureKind::Timeout, "fetch", "timed out")) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_policy_from_config_matches_defaults() {
    let policy = RetryPolicy::from_config(&RetryConfig::default());
    assert_eq!(*policy.max_retries(), 3);
    assert_eq!(*policy.base_delay(), Duration::from_secs(1));
    assert_eq!(*policy.max_delay(), Duration::from_secs(60));
    assert!(*policy.jitter());
    assert_eq!(policy.retryable(), &FailureKind::transient());
}
