//! HTTP client with retry and rate limiting
//!
//! Provides the resilient request path used by every API call:
//! - One rate limiter permit per attempt (retries are not free)
//! - Exponential backoff with random jitter, `Retry-After` honored as a floor
//! - Error classification for retry decisions
//! - Cancellation checked before admission and during backoff

use super::rate_limit::RateLimiter;
use crate::error::{Error, Result};
use crate::types::StringMap;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for the resilient client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is joined to
    pub base_url: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    pub initial_backoff: Duration,
    /// Upper bound of the exponential part of the delay
    pub max_backoff: Duration,
    /// Upper bound of the random jitter added to each delay
    pub max_jitter: Duration,
    /// Query parameters sent with every request (e.g. the API key)
    pub default_query: StringMap,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
            default_query: StringMap::new(),
            user_agent: format!("yt-ingest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for client config
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the total number of attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, initial: Duration, max: Duration, jitter: Duration) -> Self {
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self.config.max_jitter = jitter;
        self
    }

    /// Add a query parameter sent with every request
    pub fn default_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_query.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// One logical API request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Why one attempt failed, plus the server's wait hint
struct AttemptFailure {
    error: Error,
    retry_after: Option<Duration>,
}

impl From<Error> for AttemptFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// HTTP client with retry, backoff and shared rate limiting
pub struct ResilientClient {
    client: Client,
    config: ClientConfig,
    limiter: RateLimiter,
    cancel: CancellationToken,
}

impl ResilientClient {
    /// Create a client admitted through `limiter`
    pub fn new(config: ClientConfig, limiter: RateLimiter) -> Result<Self> {
        if config.max_attempts == 0 {
            return Err(Error::invalid_value("max_attempts", "must be at least 1"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            limiter,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop retrying and admitting requests once `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The shared rate limiter
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute a request, retrying transient failures
    ///
    /// Returns the parsed JSON body of the first successful attempt, a
    /// terminal error as soon as one is seen, or
    /// [`Error::ExhaustedRetries`] after `max_attempts` retryable failures.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value> {
        let url = self.build_url(&request.path);
        let max_attempts = self.config.max_attempts;

        let mut last_status = None;
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            self.limiter.acquire_or_cancel(&self.cancel).await?;

            let failure = match self.attempt(request, &url).await {
                Ok(body) => {
                    debug!(path = %request.path, attempt = attempt + 1, "Request succeeded");
                    return Ok(body);
                }
                Err(failure) => failure,
            };

            if !failure.error.is_retryable() {
                return Err(failure.error);
            }

            last_status = failure.error.status();
            last_error = failure.error.to_string();

            if attempt + 1 == max_attempts {
                break;
            }

            let delay = self.retry_delay(attempt, failure.retry_after);
            warn!(
                path = %request.path,
                "Request failed ({}), attempt {}/{}, retrying in {:?}",
                last_error,
                attempt + 1,
                max_attempts,
                delay
            );
            self.sleep_or_cancel(delay).await?;
        }

        Err(Error::ExhaustedRetries {
            attempts: max_attempts,
            last_status,
            last_error,
        })
    }

    /// Perform a single attempt and classify the outcome
    async fn attempt(
        &self,
        request: &ApiRequest,
        url: &str,
    ) -> std::result::Result<Value, AttemptFailure> {
        let mut req = self
            .client
            .request(request.method.clone(), url)
            .timeout(self.config.timeout);

        if !self.config.default_query.is_empty() {
            req = req.query(&self.config.default_query);
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        let response = req.send().await.map_err(|e| self.classify_transport(e))?;
        let status = response.status();

        if status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| self.classify_transport(e))?;
            return serde_json::from_str(&text).map_err(|e| {
                Error::decode(format!("invalid JSON from {}: {e}", request.path)).into()
            });
        }

        let retry_after = extract_retry_after(&response);
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(
                    path = %request.path,
                    status = status.as_u16(),
                    "Failed to read error body: {}",
                    e.without_url()
                );
                String::new()
            }
        };
        Err(AttemptFailure {
            error: Error::from_status(status.as_u16(), body),
            retry_after,
        })
    }

    /// Map a reqwest error onto the taxonomy
    fn classify_transport(&self, e: reqwest::Error) -> AttemptFailure {
        let error = if e.is_timeout() {
            Error::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            }
        } else if e.is_builder() {
            Error::Http(e.without_url())
        } else {
            // connect, request, body and decode failures are transient
            Error::transport(e.without_url().to_string())
        };
        error.into()
    }

    async fn sleep_or_cancel(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Exponential part of the delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(
            self.config.initial_backoff.saturating_mul(factor),
            self.config.max_backoff,
        )
    }

    /// Full delay: backoff plus jitter, never shorter than the server hint
    pub fn retry_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let jitter = self.config.max_jitter.mul_f64(rand::random::<f64>());
        let delay = self.backoff(attempt) + jitter;
        match retry_after {
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.config.base_url)
            .field("max_attempts", &self.config.max_attempts)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

/// Extract a delta-seconds `Retry-After` header value
fn extract_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
