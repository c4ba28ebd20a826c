//! Run configuration
//!
//! [`IngestConfig`] is loaded from YAML (every field optional except the API
//! key), overridden from the command line, then validated once before a run
//! starts. It fans out into the per-component configs.

use crate::api::{MAX_IDS_PER_DETAIL_REQUEST, YOUTUBE_API_URL};
use crate::error::{Error, Result};
use crate::http::{ClientConfig, RateLimiterConfig};
use crate::output::{WriterConfig, DEFAULT_PART_SIZE_BYTES};
use crate::walker::WalkerConfig;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Query parameter carrying the API key
pub const API_KEY_PARAM: &str = "key";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete configuration of one ingestion run
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// API key sent as the `key` query parameter
    #[serde(default)]
    pub api_key: Option<String>,

    /// Parents to ingest (may also come from the command line)
    #[serde(default)]
    pub channel_ids: Vec<String>,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Root directory of the partitioned output
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Partition date; today (UTC) when unset
    #[serde(default)]
    pub ingestion_date: Option<NaiveDate>,

    // ------------------------------------------------------------------
    // Request pacing and retries
    // ------------------------------------------------------------------
    /// Rolling-second request ceiling
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Cap of the exponential delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Random jitter added to each delay
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,

    // ------------------------------------------------------------------
    // Walk shape
    // ------------------------------------------------------------------
    /// Children per parent (0 = no cap)
    #[serde(default = "default_max_children")]
    pub max_children: usize,

    /// IDs per detail request
    #[serde(default = "default_detail_batch_size")]
    pub detail_batch_size: usize,

    /// Parents walked concurrently
    #[serde(default = "default_parent_concurrency")]
    pub parent_concurrency: usize,

    /// Detail requests in flight per parent
    #[serde(default = "default_detail_concurrency")]
    pub detail_concurrency: usize,

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------
    /// Uncompressed bytes per batch file before rotation
    #[serde(default = "default_part_size_bytes")]
    pub part_size_bytes: usize,

    /// Gzip level, 0-9
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

fn default_base_url() -> String {
    YOUTUBE_API_URL.to_string()
}

fn default_output_root() -> PathBuf {
    PathBuf::from("./raw")
}

fn default_rps() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_jitter_ms() -> u64 {
    250
}

fn default_max_children() -> usize {
    50
}

fn default_detail_batch_size() -> usize {
    MAX_IDS_PER_DETAIL_REQUEST
}

fn default_parent_concurrency() -> usize {
    4
}

fn default_detail_concurrency() -> usize {
    2
}

fn default_part_size_bytes() -> usize {
    DEFAULT_PART_SIZE_BYTES
}

fn default_compression_level() -> u32 {
    6
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            channel_ids: Vec::new(),
            base_url: default_base_url(),
            output_root: default_output_root(),
            ingestion_date: None,
            requests_per_second: default_rps(),
            request_timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            max_children: default_max_children(),
            detail_batch_size: default_detail_batch_size(),
            parent_concurrency: default_parent_concurrency(),
            detail_concurrency: default_detail_concurrency(),
            part_size_bytes: default_part_size_bytes(),
            compression_level: default_compression_level(),
        }
    }
}

// Never print the key
impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("channel_ids", &self.channel_ids)
            .field("base_url", &self.base_url)
            .field("output_root", &self.output_root)
            .field("ingestion_date", &self.ingestion_date)
            .field("requests_per_second", &self.requests_per_second)
            .field("max_children", &self.max_children)
            .field("part_size_bytes", &self.part_size_bytes)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Loading and Overrides
// ============================================================================

impl IngestConfig {
    /// Parse a config from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a config from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the parents to ingest
    #[must_use]
    pub fn with_channel_ids(mut self, ids: Vec<String>) -> Self {
        self.channel_ids = ids;
        self
    }

    /// Set the API base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the output root
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Set the ingestion date
    #[must_use]
    pub fn with_ingestion_date(mut self, date: NaiveDate) -> Self {
        self.ingestion_date = Some(date);
        self
    }

    /// Set the request ceiling
    #[must_use]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Set the rotation threshold
    #[must_use]
    pub fn with_part_size_bytes(mut self, bytes: usize) -> Self {
        self.part_size_bytes = bytes;
        self
    }

    /// Set the children cap
    #[must_use]
    pub fn with_max_children(mut self, max: usize) -> Self {
        self.max_children = max;
        self
    }

    /// Set retry timing in milliseconds
    #[must_use]
    pub fn with_backoff_ms(mut self, initial: u64, max: u64, jitter: u64) -> Self {
        self.initial_backoff_ms = initial;
        self.max_backoff_ms = max;
        self.max_jitter_ms = jitter;
        self
    }

    /// Check every field; called before any request is made
    pub fn validate(&self) -> Result<()> {
        match self.api_key.as_deref() {
            None => return Err(Error::missing_field("api_key")),
            Some(key) if key.trim().is_empty() => {
                return Err(Error::invalid_value("api_key", "must not be empty"))
            }
            Some(_) => {}
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_value(
                "base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if self.requests_per_second == 0 {
            return Err(Error::invalid_value("requests_per_second", "must be > 0"));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid_value("max_attempts", "must be >= 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::invalid_value("request_timeout_secs", "must be > 0"));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::invalid_value(
                "initial_backoff_ms",
                "must not exceed max_backoff_ms",
            ));
        }
        if !(1..=MAX_IDS_PER_DETAIL_REQUEST).contains(&self.detail_batch_size) {
            return Err(Error::invalid_value(
                "detail_batch_size",
                format!("must be within 1..={MAX_IDS_PER_DETAIL_REQUEST}"),
            ));
        }
        if self.parent_concurrency == 0 {
            return Err(Error::invalid_value("parent_concurrency", "must be >= 1"));
        }
        if self.detail_concurrency == 0 {
            return Err(Error::invalid_value("detail_concurrency", "must be >= 1"));
        }
        if self.part_size_bytes == 0 {
            return Err(Error::invalid_value("part_size_bytes", "must be > 0"));
        }
        if self.compression_level > 9 {
            return Err(Error::invalid_value("compression_level", "must be within 0..=9"));
        }
        if self.channel_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::invalid_value("channel_ids", "contains an empty id"));
        }
        Ok(())
    }

    // ========================================================================
    // Component Configs
    // ========================================================================

    /// Partition date of the run
    pub fn resolved_ingestion_date(&self) -> NaiveDate {
        self.ingestion_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Rate limiter settings
    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig::new(self.requests_per_second)
    }

    /// Resilient client settings, including the API key query parameter
    pub fn client_config(&self) -> ClientConfig {
        let mut builder = ClientConfig::builder()
            .base_url(&self.base_url)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .max_attempts(self.max_attempts)
            .backoff(
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
                Duration::from_millis(self.max_jitter_ms),
            );
        if let Some(key) = &self.api_key {
            builder = builder.default_query(API_KEY_PARAM, key);
        }
        builder.build()
    }

    /// Walker settings
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::new()
            .with_max_children(self.max_children)
            .with_detail_batch_size(self.detail_batch_size)
            .with_detail_concurrency(self.detail_concurrency)
    }

    /// Writer settings for the resolved ingestion date
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig::new(&self.output_root, self.resolved_ingestion_date())
            .with_rotate_bytes(self.part_size_bytes)
            .with_compression_level(self.compression_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn valid() -> IngestConfig {
        IngestConfig::default().with_api_key("k")
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.base_url, "https://www.googleapis.com/youtube/v3");
        assert_eq!(config.output_root, PathBuf::from("./raw"));
        assert_eq!(config.requests_per_second, 8);
        assert_eq!(config.part_size_bytes, 32 * 1024 * 1024);
        assert_eq!(config.max_children, 50);
        assert_eq!(config.detail_batch_size, 50);
        assert_eq!(config.parent_concurrency, 4);
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let yaml = r#"
api_key: "abc"
channel_ids: [UC1, UC2]
output_root: /data/raw
ingestion_date: 2025-01-31
requests_per_second: 4
max_children: 0
"#;
        let config = IngestConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.channel_ids, vec!["UC1", "UC2"]);
        assert_eq!(config.output_root, PathBuf::from("/data/raw"));
        assert_eq!(config.ingestion_date, NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(config.requests_per_second, 4);
        assert_eq!(config.max_children, 0);
        assert_eq!(config.detail_batch_size, 50);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = IngestConfig::from_yaml_str("api_key: a\nrps: 3\n").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_missing_api_key() {
        let err = IngestConfig::default().validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "api_key"));
    }

    #[test_case(valid().with_requests_per_second(0), "requests_per_second" ; "zero rps")]
    #[test_case(valid().with_base_url("not a url"), "base_url" ; "bad url")]
    #[test_case(valid().with_base_url("ftp://example.com"), "base_url" ; "bad scheme")]
    #[test_case(valid().with_part_size_bytes(0), "part_size_bytes" ; "zero part size")]
    #[test_case(valid().with_backoff_ms(5000, 1000, 0), "initial_backoff_ms" ; "backoff inverted")]
    #[test_case(IngestConfig { detail_batch_size: 51, ..valid() }, "detail_batch_size" ; "batch too large")]
    #[test_case(IngestConfig { parent_concurrency: 0, ..valid() }, "parent_concurrency" ; "zero parents")]
    #[test_case(valid().with_channel_ids(vec![" ".into()]), "channel_ids" ; "blank channel")]
    fn test_invalid_values(config: IngestConfig, expected_field: &str) {
        match config.validate().unwrap_err() {
            Error::InvalidConfigValue { field, .. } => assert_eq!(field, expected_field),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_client_config_carries_key() {
        let client = valid().client_config();
        assert_eq!(client.default_query.get("key").map(String::as_str), Some("k"));
        assert_eq!(client.timeout, Duration::from_secs(30));
        assert_eq!(client.max_attempts, 5);
    }

    #[test]
    fn test_debug_redacts_key() {
        let printed = format!("{:?}", IngestConfig::default().with_api_key("secret-key"));
        assert!(!printed.contains("secret-key"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_writer_config_uses_explicit_date() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        let writer = valid()
            .with_ingestion_date(date)
            .with_part_size_bytes(1024)
            .writer_config();
        assert_eq!(writer.ingestion_date(), date);
        assert_eq!(writer.rotate_bytes(), 1024);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.yaml");
        std::fs::write(&path, "api_key: k\nmax_children: 10\n").unwrap();

        let config = IngestConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.max_children, 10);

        let err = IngestConfig::from_yaml_file(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
