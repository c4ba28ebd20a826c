//! Error types for yt-ingest
//!
//! This module defines the error hierarchy for the whole ingestion engine.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Request-level transient errors (`Transport`, `Timeout`, retryable
//! `HttpStatus`) never leave the retry loop in [`crate::http::ResilientClient`];
//! callers only ever see terminal variants.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for yt-ingest
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Request Errors
    // ============================================================================
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("Not found: {body}")]
    NotFound { body: String },

    #[error("Exhausted {attempts} attempts (last status: {}): {last_error}", fmt_status(*.last_status))]
    ExhaustedRetries {
        attempts: u32,
        last_status: Option<u16>,
        last_error: String,
    },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Run cancelled")]
    Cancelled,

    // ============================================================================
    // Writer Errors
    // ============================================================================
    #[error("Writer I/O error at {}: {message}", .path.display())]
    WriterIo { path: PathBuf, message: String },

    #[error("Writer already closed")]
    WriterClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn fmt_status(status: Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status into the terminal or retryable variant
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Auth { status, body },
            404 => Self::NotFound { body },
            _ => Self::HttpStatus { status, body },
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a writer I/O error
    pub fn writer_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::WriterIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } | Error::Auth { status, .. } => Some(*status),
            Error::NotFound { .. } => Some(404),
            Error::ExhaustedRetries { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// Whether this error means the run cannot safely continue
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Error::WriterIo { .. } | Error::WriterClosed | Error::Io(_)
        )
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for yt-ingest
pub type Result<T> = std::result::Result<T, Error>;
