//! Engine types
//!
//! Per-parent outcomes and the run report printed at the end of a run.

use crate::output::CommittedFile;
use chrono::NaiveDate;
use serde::Serialize;

/// Options for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Parents walked concurrently
    pub parent_concurrency: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            parent_concurrency: 4,
        }
    }
}

impl OrchestratorOptions {
    /// Create options with the given parent concurrency
    pub fn new(parent_concurrency: usize) -> Self {
        Self { parent_concurrency }
    }
}

/// Outcome of one parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentStatus {
    /// Every listed child was resolved
    Succeeded,
    /// Some detail batches failed; their IDs are reported
    Partial,
    /// The parent lookup or listing failed
    Failed,
}

/// Report for one parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentReport {
    pub parent_id: String,
    pub status: ParentStatus,
    /// `child_entity` records written
    pub children_written: usize,
    /// `not_found` records written
    pub not_found: usize,
    /// IDs from detail batches that failed terminally
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_child_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParentReport {
    /// A parent that failed before its children were resolved
    pub fn failed(parent_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            status: ParentStatus::Failed,
            children_written: 0,
            not_found: 0,
            failed_child_ids: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Check if the parent failed
    pub fn is_failed(&self) -> bool {
        self.status == ParentStatus::Failed
    }
}

/// Summary of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub ingestion_date: NaiveDate,
    /// One entry per distinct parent, in input order
    pub parents: Vec<ParentReport>,
    /// Batch files committed by this run
    pub files: Vec<CommittedFile>,
}

impl RunReport {
    /// Check if any parent failed
    pub fn has_failures(&self) -> bool {
        self.parents.iter().any(ParentReport::is_failed)
    }

    /// Number of parents with the given status
    pub fn count(&self, status: ParentStatus) -> usize {
        self.parents.iter().filter(|p| p.status == status).count()
    }

    /// Total `child_entity` records written
    pub fn children_written(&self) -> usize {
        self.parents.iter().map(|p| p.children_written).sum()
    }

    /// Report for a parent
    pub fn parent(&self, parent_id: &str) -> Option<&ParentReport> {
        self.parents.iter().find(|p| p.parent_id == parent_id)
    }
}
