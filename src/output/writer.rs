//! Partitioned, size-rotated NDJSON writer
//!
//! One buffer per (stream, ingestion date) target. Each target sits behind
//! its own async mutex, so rotating one target never blocks writes to
//! another; compression and file I/O run on the blocking pool.

use super::atomic::{batch_file_name, commit_batch, stage_batch};
use crate::error::{Error, Result};
use crate::types::{PartitionKey, Record};
use bytes::BytesMut;
use chrono::NaiveDate;
use flate2::Compression;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

/// Default rotation threshold (uncompressed bytes)
pub const DEFAULT_PART_SIZE_BYTES: usize = 32 * 1024 * 1024;

/// Configuration for the partitioned writer
#[derive(Debug, Clone)]
pub struct WriterConfig {
    output_root: PathBuf,
    ingestion_date: NaiveDate,
    rotate_bytes: usize,
    compression: Compression,
}

impl WriterConfig {
    /// Create a config for one run
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>, ingestion_date: NaiveDate) -> Self {
        Self {
            output_root: output_root.into(),
            ingestion_date,
            rotate_bytes: DEFAULT_PART_SIZE_BYTES,
            compression: Compression::default(),
        }
    }

    /// Set the rotation threshold
    #[must_use]
    pub fn with_rotate_bytes(mut self, bytes: usize) -> Self {
        self.rotate_bytes = bytes.max(1);
        self
    }

    /// Set the gzip level (0-9)
    #[must_use]
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Root directory
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Ingestion date of the run
    pub fn ingestion_date(&self) -> NaiveDate {
        self.ingestion_date
    }

    /// Rotation threshold
    pub fn rotate_bytes(&self) -> usize {
        self.rotate_bytes
    }

    /// Directory of a partition: `<root>/<stream>/ingestion_date=<date>`
    pub fn partition_dir(&self, key: &PartitionKey) -> PathBuf {
        self.output_root
            .join(key.stream.as_str())
            .join(key.partition_dir_name())
    }
}

/// A batch file that is visible on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedFile {
    /// Target it belongs to
    pub partition: PartitionKey,
    /// Sequence number within the target
    pub sequence: u32,
    /// Final path
    pub path: PathBuf,
    /// Records in the file
    pub records: usize,
    /// Size before compression
    pub uncompressed_bytes: usize,
    /// Size on disk
    pub compressed_bytes: u64,
}

/// Open buffer of one target
#[derive(Debug)]
struct TargetBuffer {
    key: PartitionKey,
    dir: PathBuf,
    buffer: BytesMut,
    records: usize,
    next_sequence: u32,
}

impl TargetBuffer {
    fn new(key: PartitionKey, dir: PathBuf) -> Self {
        Self {
            key,
            dir,
            buffer: BytesMut::new(),
            records: 0,
            next_sequence: 0,
        }
    }
}

/// Durable, atomic, size-bounded record writer
#[derive(Debug)]
pub struct PartitionedRecordWriter {
    config: WriterConfig,
    targets: Mutex<HashMap<PartitionKey, Arc<AsyncMutex<TargetBuffer>>>>,
    committed: Mutex<Vec<CommittedFile>>,
    closed: AtomicBool,
}

impl PartitionedRecordWriter {
    /// Create a writer; nothing touches the disk until the first commit
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            targets: Mutex::new(HashMap::new()),
            committed: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Writer configuration
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Append a record to its target, rotating when the threshold is reached
    pub async fn write(&self, record: &Record) -> Result<()> {
        let line = record.to_line()?;
        let key = PartitionKey::new(record.stream(), self.config.ingestion_date);
        let target = self.target(key)?;

        let mut target = target.lock().await;
        // Checked under the target lock so close() cannot miss this line
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::WriterClosed);
        }

        target.buffer.extend_from_slice(&line);
        target.records += 1;

        if target.buffer.len() >= self.config.rotate_bytes {
            self.finalize(&mut target).await?;
        }
        Ok(())
    }

    /// Append several records in order
    pub async fn write_all(&self, records: &[Record]) -> Result<()> {
        for record in records {
            self.write(record).await?;
        }
        Ok(())
    }

    /// Finalize every non-empty buffer and refuse further writes
    ///
    /// Returns every file committed during the run, ordered by target and
    /// sequence. Calling it again returns the same list.
    pub async fn close(&self) -> Result<Vec<CommittedFile>> {
        self.closed.store(true, Ordering::SeqCst);

        let mut targets: Vec<_> = self
            .targets
            .lock()
            .map_err(|_| Error::Other("writer target map poisoned".to_string()))?
            .iter()
            .map(|(key, target)| (*key, Arc::clone(target)))
            .collect();
        targets.sort_by_key(|(key, _)| *key);

        for (_, target) in targets {
            let mut target = target.lock().await;
            self.finalize(&mut target).await?;
        }

        let files = self.committed_files();
        info!(files = files.len(), "Writer closed");
        Ok(files)
    }

    /// Files committed so far, ordered by target and sequence
    pub fn committed_files(&self) -> Vec<CommittedFile> {
        let mut files = self
            .committed
            .lock()
            .map(|files| files.clone())
            .unwrap_or_default();
        files.sort_by(|a, b| (a.partition, a.sequence).cmp(&(b.partition, b.sequence)));
        files
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn target(&self, key: PartitionKey) -> Result<Arc<AsyncMutex<TargetBuffer>>> {
        let mut targets = self
            .targets
            .lock()
            .map_err(|_| Error::Other("writer target map poisoned".to_string()))?;
        let target = targets.entry(key).or_insert_with(|| {
            let dir = self.config.partition_dir(&key);
            Arc::new(AsyncMutex::new(TargetBuffer::new(key, dir)))
        });
        Ok(Arc::clone(target))
    }

    /// Compress, stage and commit the target's buffer
    ///
    /// The caller holds the target lock, so sequence numbers are assigned and
    /// committed in order.
    async fn finalize(&self, target: &mut TargetBuffer) -> Result<()> {
        if target.buffer.is_empty() {
            return Ok(());
        }

        let data = target.buffer.split().freeze();
        let records = std::mem::take(&mut target.records);
        let sequence = target.next_sequence;
        target.next_sequence += 1;

        let dir = target.dir.clone();
        let level = self.config.compression;
        let final_name = batch_file_name(sequence);

        let staged = tokio::task::spawn_blocking(move || {
            let staged = stage_batch(&dir, &final_name, &data, level)?;
            commit_batch(&staged)?;
            Ok::<_, Error>((staged, data.len()))
        })
        .await
        .map_err(|e| Error::writer_io(&target.dir, format!("finalize task failed: {e}")))?;
        let (staged, uncompressed_bytes) = staged?;

        debug!(
            partition = %target.key,
            sequence,
            records,
            uncompressed_bytes,
            compressed_bytes = staged.compressed_bytes,
            "Committed batch"
        );

        let file = CommittedFile {
            partition: target.key,
            sequence,
            path: staged.final_path,
            records,
            uncompressed_bytes,
            compressed_bytes: staged.compressed_bytes,
        };
        self.committed
            .lock()
            .map_err(|_| Error::Other("writer file list poisoned".to_string()))?
            .push(file);
        Ok(())
    }
}
