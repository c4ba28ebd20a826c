//! Atomic batch commit
//!
//! A batch is gzip-compressed into a hidden temporary file in the partition
//! directory, fsynced, then renamed onto its final `part-NNNNN` name. The
//! temporary name never matches `part-*`, so a crash between the two steps
//! leaves only a stray dotfile. Requires same-directory `rename(2)` to be
//! atomic on the target filesystem.

use crate::error::{Error, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Extension of committed batch files
pub const BATCH_EXTENSION: &str = "ndjson.gz";

/// Final file name for a sequence number, e.g. `part-00003.ndjson.gz`
pub fn batch_file_name(sequence: u32) -> String {
    format!("part-{sequence:05}.{BATCH_EXTENSION}")
}

/// Temporary name used while a batch is being written
pub fn temp_file_name(final_name: &str) -> String {
    format!(".{final_name}.tmp")
}

/// A fully written but not yet visible batch
#[derive(Debug)]
pub struct StagedBatch {
    /// Hidden temporary path
    pub temp_path: PathBuf,
    /// Path the batch becomes visible under
    pub final_path: PathBuf,
    /// Size on disk
    pub compressed_bytes: u64,
}

fn io_err(path: &Path, e: &std::io::Error) -> Error {
    Error::writer_io(path, e.to_string())
}

/// Compress `data` into the temporary file for `final_name` and fsync it
pub fn stage_batch(
    dir: &Path,
    final_name: &str,
    data: &[u8],
    level: Compression,
) -> Result<StagedBatch> {
    fs::create_dir_all(dir).map_err(|e| io_err(dir, &e))?;

    let temp_path = dir.join(temp_file_name(final_name));
    let final_path = dir.join(final_name);

    let file = File::create(&temp_path).map_err(|e| io_err(&temp_path, &e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), level);
    encoder
        .write_all(data)
        .map_err(|e| io_err(&temp_path, &e))?;
    let file = encoder
        .finish()
        .map_err(|e| io_err(&temp_path, &e))?
        .into_inner()
        .map_err(|e| io_err(&temp_path, e.error()))?;
    file.sync_all().map_err(|e| io_err(&temp_path, &e))?;

    let compressed_bytes = file
        .metadata()
        .map_err(|e| io_err(&temp_path, &e))?
        .len();

    Ok(StagedBatch {
        temp_path,
        final_path,
        compressed_bytes,
    })
}

/// Make a staged batch visible under its final name
pub fn commit_batch(staged: &StagedBatch) -> Result<()> {
    fs::rename(&staged.temp_path, &staged.final_path)
        .map_err(|e| io_err(&staged.final_path, &e))?;

    // Persist the directory entry; not every platform can open a directory
    #[cfg(unix)]
    if let Some(dir) = staged.final_path.parent() {
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| io_err(dir, &e))?;
    }
    Ok(())
}
