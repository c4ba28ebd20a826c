//! HTTP client module
//!
//! Provides the resilient, rate-limited request path.
//!
//! # Features
//!
//! - **Rate Limiting**: One shared governor-backed gate per run
//! - **Automatic Retries**: 429/5xx and transport failures, bounded attempts
//! - **Backoff**: Exponential with jitter, `Retry-After` as a floor
//! - **Cancellation**: Run-level token stops admission and backoff waits

mod client;
mod rate_limit;

pub use client::{ApiRequest, ClientConfig, ClientConfigBuilder, ResilientClient};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
