//! Common types used throughout yt-ingest
//!
//! This module contains the persisted [`Record`] model, the stream and
//! partition identifiers, and small shared type aliases.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Generic key-value map with string keys and values
pub type StringMap = std::collections::HashMap<String, String>;

// ============================================================================
// Constants
// ============================================================================

/// Provider tag written into every record's `source` field
pub const SOURCE_TAG: &str = "youtube_api_v3";

/// Message of the `info` record emitted for a parent without children
pub const NO_CHILDREN_FOUND: &str = "no_children_found";

/// Message of the `not_found` record emitted for a listed child whose
/// details were not returned
pub const NOT_RETURNED_BY_DETAILS: &str = "not_returned_by_details";

// ============================================================================
// Streams and Partitions
// ============================================================================

/// Logical output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    /// Parent entities (channels) and per-parent info markers
    Channels,
    /// Child entities (videos) and not-found markers
    Videos,
}

impl Stream {
    /// Directory / `entity` name of the stream
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Channels => "channels",
            Stream::Videos => "videos",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a record on disk: one stream on one ingestion date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PartitionKey {
    /// Output stream
    pub stream: Stream,
    /// Ingestion date of the run
    pub ingestion_date: NaiveDate,
}

impl PartitionKey {
    /// Create a new partition key
    pub fn new(stream: Stream, ingestion_date: NaiveDate) -> Self {
        Self {
            stream,
            ingestion_date,
        }
    }

    /// Hive-style directory name, e.g. `ingestion_date=2025-01-31`
    pub fn partition_dir_name(&self) -> String {
        format!("ingestion_date={}", self.ingestion_date.format("%Y-%m-%d"))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream, self.partition_dir_name())
    }
}

// ============================================================================
// Walk Types
// ============================================================================

/// A child entity discovered while listing a parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChildRef {
    /// Child identifier (video ID)
    pub id: String,
    /// Parent the child was listed under
    pub parent_id: String,
}

impl ChildRef {
    /// Create a new child reference
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Record tag, serialized as the `_type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    PrimaryEntity,
    ChildEntity,
    Info,
    NotFound,
}

impl RecordType {
    /// Stream a record of this type is written to
    pub fn stream(self) -> Stream {
        match self {
            RecordType::PrimaryEntity | RecordType::Info => Stream::Channels,
            RecordType::ChildEntity | RecordType::NotFound => Stream::Videos,
        }
    }
}

/// The persisted unit: one line in a batch file
///
/// Records are built through the constructors below and never mutated
/// afterwards. Field order matches the on-disk line format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_type")]
    pub(crate) record_type: RecordType,
    #[serde(with = "utc_seconds")]
    pub(crate) ingestion_ts: DateTime<Utc>,
    pub(crate) source: String,
    pub(crate) entity: Stream,
    pub(crate) parent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) child_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) payload: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl Record {
    fn base(record_type: RecordType, parent_id: impl Into<String>) -> Self {
        Self {
            record_type,
            ingestion_ts: now_seconds(),
            source: SOURCE_TAG.to_string(),
            entity: record_type.stream(),
            parent_id: parent_id.into(),
            child_id: None,
            payload: None,
            message: None,
        }
    }

    /// Parent entity record carrying the full parent payload
    pub fn primary(parent_id: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            payload: Some(payload),
            ..Self::base(RecordType::PrimaryEntity, parent_id)
        }
    }

    /// Child entity record carrying the full child payload
    pub fn child(child: &ChildRef, payload: JsonValue) -> Self {
        Self {
            child_id: Some(child.id.clone()),
            payload: Some(payload),
            ..Self::base(RecordType::ChildEntity, child.parent_id.clone())
        }
    }

    /// Marker for a listed child whose details were not returned
    pub fn not_found(child: &ChildRef) -> Self {
        Self {
            child_id: Some(child.id.clone()),
            message: Some(NOT_RETURNED_BY_DETAILS.to_string()),
            ..Self::base(RecordType::NotFound, child.parent_id.clone())
        }
    }

    /// Informational marker for a parent
    pub fn info(parent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::base(RecordType::Info, parent_id)
        }
    }

    /// Stream the record belongs to
    pub fn stream(&self) -> Stream {
        self.entity
    }

    /// Record tag
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Creation time, whole seconds
    pub fn ingestion_ts(&self) -> DateTime<Utc> {
        self.ingestion_ts
    }

    /// Provider tag
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn child_id(&self) -> Option<&str> {
        self.child_id.as_deref()
    }

    /// Opaque provider payload of entity records
    pub fn payload(&self) -> Option<&JsonValue> {
        self.payload.as_ref()
    }

    /// Marker text of `info` and `not_found` records
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Serialize to one NDJSON line, including the trailing newline
    pub fn to_line(&self) -> crate::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Current UTC time truncated to whole seconds
fn now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

/// `YYYY-MM-DDTHH:MM:SSZ` (de)serialization for record timestamps
mod utc_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
