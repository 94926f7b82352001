//! Bounded exponential backoff over classified failures.
//!
//! Delay before retry `i` (0-indexed) is `min(base * factor^i, max)`, scaled
//! by a uniform factor in `[0.5, 1.0]` when jitter is enabled. Only failures
//! whose [`FailureKind`] is in the policy's retryable set are retried; all
//! others surface after the first attempt.

use crate::RetryConfig;
use rand::Rng;
use sheetpost_error::{FailureKind, RetryableError};
use std::future::Future;
use std::time::Duration;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// Retry parameters for a single class of operation.
///
/// Policies carry no state between calls; one value can wrap any number of
/// concurrent operations.
///
/// # Example
///
/// ```rust,ignore
/// let policy = RetryPolicyBuilder::default()
///     .max_retries(5usize)
///     .retryable(vec![FailureKind::Timeout])
///     .build()?;
/// let rows = policy.run("fetch_rows", || source.fetch_rows()).await?;
/// ```
#[derive(Debug, Clone, PartialEq, derive_getters::Getters, derive_builder::Builder)]
#[builder(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    max_retries: usize,
    /// Delay before the first retry
    base_delay: Duration,
    /// Cap on any single delay
    max_delay: Duration,
    /// Growth factor between consecutive delays
    backoff_factor: f64,
    /// Scale delays by a random factor in [0.5, 1.0]
    jitter: bool,
    /// Failure kinds worth another attempt
    #[builder(setter(into))]
    retryable: Vec<FailureKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: true,
            retryable: FailureKind::transient(),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from the `[retry]` configuration section.
    pub fn from_config(config: &RetryConfig) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: *config.max_retries(),
            base_delay: Duration::try_from_secs_f64(*config.base_delay_seconds())
                .unwrap_or(defaults.base_delay),
            max_delay: Duration::try_from_secs_f64(*config.max_delay_seconds())
                .unwrap_or(defaults.max_delay),
            backoff_factor: *config.backoff_factor(),
            jitter: *config.jitter(),
            retryable: config.retryable().clone(),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Replace the retryable failure kinds.
    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    /// Whether this policy retries the given kind.
    pub fn retries(&self, kind: FailureKind) -> bool {
        self.retryable.contains(&kind)
    }

    /// Un-jittered delay before retry `attempt` (0-indexed).
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetpost_rate_limit::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    /// assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(60));
    /// ```
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// The delays slept between attempts, jittered if enabled.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
        }
    }

    /// Run `operation` until it succeeds, fails permanently or retries run out.
    ///
    /// The operation is invoked at most `max_retries + 1` times. The last
    /// failure is returned unchanged.
    pub async fn run<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let retryable = &self.retryable;
        let mut attempt = 0usize;

        Retry::spawn(self.backoff(), || {
            attempt += 1;
            let current = attempt;
            let fut = operation();
            async move {
                match fut.await {
                    Ok(value) => {
                        if current > 1 {
                            debug!(operation = operation_name, attempt = current, "Succeeded after retry");
                        }
                        Ok(value)
                    }
                    Err(e) => {
                        let kind = e.failure_kind();
                        if retryable.contains(&kind) {
                            warn!(
                                operation = operation_name,
                                attempt = current,
                                failure = %kind,
                                error = %e,
                                "Transient error, will retry"
                            );
                            Err(RetryError::Transient {
                                err: e,
                                retry_after: None,
                            })
                        } else {
                            warn!(
                                operation = operation_name,
                                attempt = current,
                                failure = %kind,
                                error = %e,
                                "Permanent error, failing immediately"
                            );
                            Err(RetryError::Permanent(e))
                        }
                    }
                }
            }
        })
        .await
    }
}

/// Iterator over a policy's backoff delays.
///
/// Yields exactly `max_retries` delays.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: usize,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_retries {
            return None;
        }
        let delay = self.policy.delay_for_attempt(self.attempt);
        self.attempt += 1;

        if self.policy.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            Some(delay.mul_f64(factor))
        } else {
            Some(delay)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_yields_max_retries_delays() {
        let policy = RetryPolicyBuilder::default()
            .max_retries(4usize)
            .jitter(false)
            .build()
            .unwrap();
        let delays: Vec<_> = policy.backoff().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn test_jittered_delay_within_half_to_full() {
        let policy = RetryPolicyBuilder::default()
            .max_retries(6usize)
            .base_delay(Duration::from_secs(2))
            .build()
            .unwrap();
        for (attempt, delay) in policy.backoff().enumerate() {
            let full = policy.delay_for_attempt(attempt);
            assert!(delay <= full, "attempt {attempt}: {delay:?} > {full:?}");
            assert!(delay >= full / 2, "attempt {attempt}: {delay:?} < half of {full:?}");
        }
    }

    #[test]
    fn test_none_policy_has_no_delays() {
        assert_eq!(RetryPolicy::none().backoff().count(), 0);
    }
}
