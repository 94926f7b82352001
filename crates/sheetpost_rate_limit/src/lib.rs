//! Rate limiting and retry for calls to external APIs.
//!
//! Three independent tools are provided:
//! - [`RateLimiter`] spaces consecutive calls by a fixed minimum interval
//! - [`AdvancedRateLimiter`] gates calls by per-minute, per-hour and burst
//!   windows and supports an explicit cooldown period
//! - [`RetryPolicy`] re-runs a fallible async operation with bounded,
//!   jittered exponential backoff
//!
//! Instances are plain values. Callers construct them and share them through
//! `Arc` where more than one component needs the same limiter.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod advanced;
mod config;
mod limiter;
mod retry;

pub use advanced::{AdvancedRateLimiter, CallDecision, DenialReason, LimiterStats};
pub use config::{PacingConfig, RetryConfig, WindowLimits};
pub use limiter::RateLimiter;
pub use retry::{Backoff, RetryPolicy, RetryPolicyBuilder};
