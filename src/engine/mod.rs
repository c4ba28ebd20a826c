//! Execution engine module
//!
//! Drives a run: walks every parent with bounded parallelism, converts each
//! walk into records and hands them to the writer.
//!
//! # Overview
//!
//! The engine module provides:
//! - `IngestionOrchestrator` - Runs parents concurrently and always closes the writer
//! - `RunReport` / `ParentReport` - Per-parent outcome of a run
//!
//! Per-parent failures are recorded and the run continues; writer failures
//! abort the run.

mod types;

pub use types::{OrchestratorOptions, ParentReport, ParentStatus, RunReport};

use crate::api::YouTubeApi;
use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::http::{RateLimiter, ResilientClient};
use crate::output::PartitionedRecordWriter;
use crate::types::{Record, NO_CHILDREN_FOUND};
use crate::walker::{Children, EntityWalker, WalkFailure, WalkReport};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs one ingestion over a set of parents
#[derive(Debug)]
pub struct IngestionOrchestrator {
    walker: EntityWalker,
    writer: Arc<PartitionedRecordWriter>,
    options: OrchestratorOptions,
    cancel: CancellationToken,
}

impl IngestionOrchestrator {
    /// Create an orchestrator from prepared collaborators
    pub fn new(
        walker: EntityWalker,
        writer: PartitionedRecordWriter,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            walker,
            writer: Arc::new(writer),
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the full stack for a validated config
    ///
    /// One limiter, one client and one writer are shared by every parent
    /// of the run.
    pub fn from_config(config: &IngestConfig, cancel: CancellationToken) -> Result<Self> {
        config.validate()?;

        let limiter = RateLimiter::new(&config.rate_limiter_config())?;
        let client =
            ResilientClient::new(config.client_config(), limiter)?.with_cancellation(cancel.clone());
        let walker = EntityWalker::new(Arc::new(YouTubeApi::new(client)), config.walker_config());
        let writer = PartitionedRecordWriter::new(config.writer_config());

        Ok(Self::new(
            walker,
            writer,
            OrchestratorOptions::new(config.parent_concurrency),
        )
        .with_cancellation(cancel))
    }

    /// Use an external cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The writer of this run
    pub fn writer(&self) -> &PartitionedRecordWriter {
        &self.writer
    }

    /// Ingest every parent and close the writer
    ///
    /// Duplicate parent IDs are processed once. The writer is closed even
    /// when the run is aborted or cancelled.
    pub async fn run(&self, parent_ids: &[String]) -> Result<RunReport> {
        let start = Instant::now();
        let ingestion_date = self.writer.config().ingestion_date();

        let mut seen = HashSet::new();
        let parents: Vec<&str> = parent_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        info!(
            parents = parents.len(),
            %ingestion_date,
            concurrency = self.options.parent_concurrency,
            "Starting run"
        );

        let mut reports = Vec::with_capacity(parents.len());
        let mut fatal = None;
        {
            let mut results = stream::iter(parents.iter().enumerate())
                .map(|(index, parent_id)| async move {
                    (index, self.process_parent(parent_id).await)
                })
                .buffer_unordered(self.options.parent_concurrency.max(1));

            while let Some((index, result)) = results.next().await {
                match result {
                    Ok(report) => reports.push((index, report)),
                    Err(e) => {
                        error!("Aborting run: {e}");
                        fatal = Some(e);
                        break;
                    }
                }
            }
        }

        let closed = self.writer.close().await;
        if let Some(e) = fatal {
            if let Err(close_err) = closed {
                warn!("Writer close after abort also failed: {close_err}");
            }
            return Err(e);
        }
        let files = closed?;

        reports.sort_by_key(|(index, _)| *index);
        let report = RunReport {
            ingestion_date,
            parents: reports.into_iter().map(|(_, r)| r).collect(),
            files,
        };

        info!(
            succeeded = report.count(ParentStatus::Succeeded),
            partial = report.count(ParentStatus::Partial),
            failed = report.count(ParentStatus::Failed),
            files = report.files.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Run complete"
        );
        Ok(report)
    }

    /// Walk one parent and write its records
    ///
    /// Only writer errors are returned as `Err`.
    async fn process_parent(&self, parent_id: &str) -> Result<ParentReport> {
        if self.cancel.is_cancelled() {
            return Ok(ParentReport::failed(parent_id, Error::Cancelled.to_string()));
        }

        match self.walker.walk(parent_id).await {
            Ok(walk) => self.write_walk(walk).await,
            Err(failure) => self.write_failure(failure).await,
        }
    }

    async fn write_walk(&self, walk: WalkReport) -> Result<ParentReport> {
        let failed_child_ids = walk.failed_child_ids();
        let WalkReport {
            parent_id,
            parent,
            children,
            batch_failures,
        } = walk;

        self.writer
            .write(&Record::primary(parent_id.as_str(), parent))
            .await?;

        let mut children_written = 0;
        let mut not_found = 0;
        match children {
            Children::Empty => {
                self.writer
                    .write(&Record::info(parent_id.as_str(), NO_CHILDREN_FOUND))
                    .await?;
            }
            Children::Reconciled(reconciliation) => {
                for (child, payload) in reconciliation.found {
                    self.writer.write(&Record::child(&child, payload)).await?;
                    children_written += 1;
                }
                for child in &reconciliation.missing {
                    self.writer.write(&Record::not_found(child)).await?;
                    not_found += 1;
                }
            }
        }

        let (status, error) = if batch_failures.is_empty() {
            (ParentStatus::Succeeded, None)
        } else {
            let messages: Vec<String> = batch_failures.iter().map(|f| f.error.to_string()).collect();
            warn!(
                parent_id = %parent_id,
                failed_children = failed_child_ids.len(),
                "Parent partially ingested"
            );
            (ParentStatus::Partial, Some(messages.join("; ")))
        };

        info!(
            parent_id = %parent_id,
            children_written,
            not_found,
            "Parent ingested"
        );
        Ok(ParentReport {
            parent_id,
            status,
            children_written,
            not_found,
            failed_child_ids,
            error,
        })
    }

    async fn write_failure(&self, failure: WalkFailure) -> Result<ParentReport> {
        warn!(
            parent_id = %failure.parent_id,
            stage = %failure.stage,
            "Parent failed: {}",
            failure.error
        );

        let message = failure.to_string();
        // The parent payload is still worth keeping when only the listing failed
        if let Some(parent) = failure.parent {
            self.writer
                .write(&Record::primary(failure.parent_id.as_str(), parent))
                .await?;
        }
        Ok(ParentReport::failed(failure.parent_id, message))
    }
}

#[cfg(test)]
mod tests;
