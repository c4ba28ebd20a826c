//! Output module
//!
//! Durable, partitioned NDJSON output.
//!
//! # Overview
//!
//! Records are routed by stream into one target per
//! `(stream, ingestion_date)`, buffered in memory, and committed as gzip
//! batch files:
//!
//! ```text
//! <root>/channels/ingestion_date=2025-01-31/part-00000.ndjson.gz
//! <root>/videos/ingestion_date=2025-01-31/part-00000.ndjson.gz
//! <root>/videos/ingestion_date=2025-01-31/part-00001.ndjson.gz
//! ```
//!
//! A batch file is either absent or complete; see [`stage_batch`] and
//! [`commit_batch`].

mod atomic;
mod writer;

pub use atomic::{
    batch_file_name, commit_batch, stage_batch, temp_file_name, StagedBatch, BATCH_EXTENSION,
};
pub use writer::{CommittedFile, PartitionedRecordWriter, WriterConfig, DEFAULT_PART_SIZE_BYTES};
