//! Tests for engine module

use super::*;
use crate::api::{ChildDetail, ChildPage, EntityApi};
use crate::output::WriterConfig;
use crate::pagination::PageRequest;
use crate::types::RecordType;
use crate::walker::WalkerConfig;
use async_trait::async_trait;
use chrono::NaiveDate;
use flate2::read::GzDecoder;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tempfile::tempdir;

// ============================================================================
// Test API
// ============================================================================

/// Single-page catalogue: parent -> listed children, plus the children the
/// detail endpoint knows about.
#[derive(Default)]
struct CatalogApi {
    parents: HashMap<String, Vec<String>>,
    known_children: HashSet<String>,
    broken_listing: HashSet<String>,
    broken_details: HashSet<String>,
}

impl CatalogApi {
    fn parent(mut self, id: &str, children: &[&str]) -> Self {
        self.parents.insert(
            id.to_string(),
            children.iter().map(|c| (*c).to_string()).collect(),
        );
        self
    }

    fn known(mut self, ids: &[&str]) -> Self {
        self.known_children
            .extend(ids.iter().map(|c| (*c).to_string()));
        self
    }
}

#[async_trait]
impl EntityApi for CatalogApi {
    async fn get_parent(&self, parent_id: &str) -> crate::Result<Value> {
        if self.parents.contains_key(parent_id) {
            Ok(json!({"id": parent_id, "snippet": {"title": format!("channel {parent_id}")}}))
        } else {
            Err(Error::NotFound {
                body: format!("channel {parent_id} not found"),
            })
        }
    }

    async fn list_children(&self, parent_id: &str, page: &PageRequest) -> crate::Result<ChildPage> {
        if self.broken_listing.contains(parent_id) {
            return Err(Error::ExhaustedRetries {
                attempts: 5,
                last_status: Some(500),
                last_error: "HTTP 500".to_string(),
            });
        }
        let child_ids = self
            .parents
            .get(parent_id)
            .map(|ids| ids.iter().take(page.max_results).cloned().collect())
            .unwrap_or_default();
        Ok(ChildPage {
            child_ids,
            next_page_token: None,
        })
    }

    async fn get_children_details(&self, child_ids: &[String]) -> crate::Result<Vec<ChildDetail>> {
        if child_ids.iter().any(|id| self.broken_details.contains(id)) {
            return Err(Error::from_status(503, "backend error"));
        }
        Ok(child_ids
            .iter()
            .filter(|id| self.known_children.contains(*id))
            .map(|id| ChildDetail {
                id: id.clone(),
                payload: json!({"id": id, "statistics": {"viewCount": "1"}}),
            })
            .collect())
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
}

fn orchestrator(api: CatalogApi, root: &Path) -> IngestionOrchestrator {
    let walker = EntityWalker::new(
        Arc::new(api),
        WalkerConfig::default().with_detail_batch_size(1),
    );
    let writer = PartitionedRecordWriter::new(WriterConfig::new(root, date()));
    IngestionOrchestrator::new(walker, writer, OrchestratorOptions::new(2))
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| (*s).to_string()).collect()
}

fn read_partition(root: &Path, stream: &str) -> Vec<crate::types::Record> {
    let dir = root.join(stream).join("ingestion_date=2025-01-31");
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut paths: Vec<_> = entries.map(|e| e.unwrap().path()).collect();
    paths.sort();
    paths
        .iter()
        .flat_map(|p| {
            BufReader::new(GzDecoder::new(File::open(p).unwrap()))
                .lines()
                .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn count(records: &[crate::types::Record], record_type: RecordType) -> usize {
    records.iter().filter(|r| r.record_type == record_type).count()
}

// ============================================================================
// Options / Report Tests
// ============================================================================

#[test]
fn test_default_options() {
    assert_eq!(OrchestratorOptions::default().parent_concurrency, 4);
}

#[test]
fn test_run_report_helpers() {
    let report = RunReport {
        ingestion_date: date(),
        parents: vec![
            ParentReport {
                parent_id: "A".into(),
                status: ParentStatus::Succeeded,
                children_written: 3,
                not_found: 0,
                failed_child_ids: Vec::new(),
                error: None,
            },
            ParentReport::failed("B", "boom"),
        ],
        files: Vec::new(),
    };

    assert!(report.has_failures());
    assert_eq!(report.count(ParentStatus::Failed), 1);
    assert_eq!(report.children_written(), 3);
    assert_eq!(report.parent("B").unwrap().error.as_deref(), Some("boom"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["ingestion_date"], "2025-01-31");
    assert_eq!(json["parents"][1]["status"], "failed");
}

// ============================================================================
// Run Tests
// ============================================================================

#[tokio::test]
async fn test_end_to_end_reconciliation() {
    let dir = tempdir().unwrap();
    let api = CatalogApi::default()
        .parent("P1", &["A", "B", "C"])
        .known(&["A", "C"]);

    let report = orchestrator(api, dir.path()).run(&ids(&["P1"])).await.unwrap();

    let parent = report.parent("P1").unwrap();
    assert_eq!(parent.status, ParentStatus::Succeeded);
    assert_eq!(parent.children_written, 2);
    assert_eq!(parent.not_found, 1);

    let channels = read_partition(dir.path(), "channels");
    let videos = read_partition(dir.path(), "videos");
    assert_eq!(count(&channels, RecordType::PrimaryEntity), 1);
    assert_eq!(count(&videos, RecordType::ChildEntity), 2);
    assert_eq!(count(&videos, RecordType::NotFound), 1);

    let missing = videos
        .iter()
        .find(|r| r.record_type == RecordType::NotFound)
        .unwrap();
    assert_eq!(missing.child_id.as_deref(), Some("B"));
    assert_eq!(missing.parent_id, "P1");
    assert!(missing.payload.is_none());
    assert_eq!(missing.message(), Some(crate::types::NOT_RETURNED_BY_DETAILS));

    assert_eq!(report.files.len(), 2);
}

#[tokio::test]
async fn test_parent_without_children_gets_info_record() {
    let dir = tempdir().unwrap();
    let api = CatalogApi::default().parent("P1", &[]);

    let report = orchestrator(api, dir.path()).run(&ids(&["P1"])).await.unwrap();

    assert_eq!(report.parent("P1").unwrap().status, ParentStatus::Succeeded);
    let channels = read_partition(dir.path(), "channels");
    assert_eq!(count(&channels, RecordType::PrimaryEntity), 1);
    let info = channels
        .iter()
        .find(|r| r.record_type == RecordType::Info)
        .unwrap();
    assert_eq!(info.message.as_deref(), Some(NO_CHILDREN_FOUND));
    assert!(read_partition(dir.path(), "videos").is_empty());
}

#[tokio::test]
async fn test_failed_parent_does_not_abort_run() {
    let dir = tempdir().unwrap();
    let api = CatalogApi::default().parent("P1", &["A"]).known(&["A"]);

    let report = orchestrator(api, dir.path())
        .run(&ids(&["missing", "P1"]))
        .await
        .unwrap();

    assert!(report.has_failures());
    // Input order is preserved
    assert_eq!(report.parents[0].parent_id, "missing");
    assert_eq!(report.parents[0].status, ParentStatus::Failed);
    assert!(report.parents[0]
        .error
        .as_deref()
        .unwrap()
        .contains("failed at parent"));
    assert_eq!(report.parents[1].status, ParentStatus::Succeeded);
    assert_eq!(count(&read_partition(dir.path(), "videos"), RecordType::ChildEntity), 1);
}

#[tokio::test]
async fn test_listing_failure_still_writes_parent() {
    let dir = tempdir().unwrap();
    let mut api = CatalogApi::default().parent("P1", &["A"]);
    api.broken_listing.insert("P1".to_string());

    let report = orchestrator(api, dir.path()).run(&ids(&["P1"])).await.unwrap();

    let parent = report.parent("P1").unwrap();
    assert_eq!(parent.status, ParentStatus::Failed);
    assert!(parent.error.as_deref().unwrap().contains("list_children"));
    assert_eq!(
        count(&read_partition(dir.path(), "channels"), RecordType::PrimaryEntity),
        1
    );
}

#[tokio::test]
async fn test_failed_detail_batch_marks_partial() {
    let dir = tempdir().unwrap();
    let mut api = CatalogApi::default()
        .parent("P1", &["A", "B", "C"])
        .known(&["A", "B", "C"]);
    api.broken_details.insert("B".to_string());

    let report = orchestrator(api, dir.path()).run(&ids(&["P1"])).await.unwrap();

    let parent = report.parent("P1").unwrap();
    assert_eq!(parent.status, ParentStatus::Partial);
    assert_eq!(parent.failed_child_ids, vec!["B"]);
    assert_eq!(parent.children_written, 2);
    assert_eq!(parent.not_found, 0);
    assert!(!report.has_failures());

    let videos = read_partition(dir.path(), "videos");
    assert_eq!(count(&videos, RecordType::NotFound), 0);
}

#[tokio::test]
async fn test_duplicate_parents_processed_once() {
    let dir = tempdir().unwrap();
    let api = CatalogApi::default().parent("P1", &["A"]).known(&["A"]);

    let report = orchestrator(api, dir.path())
        .run(&ids(&["P1", "P1", "P1"]))
        .await
        .unwrap();

    assert_eq!(report.parents.len(), 1);
    assert_eq!(
        count(&read_partition(dir.path(), "channels"), RecordType::PrimaryEntity),
        1
    );
}

#[tokio::test]
async fn test_cancelled_run_fails_parents_and_closes_writer() {
    let dir = tempdir().unwrap();
    let api = CatalogApi::default().parent("P1", &["A"]).known(&["A"]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let orchestrator = orchestrator(api, dir.path()).with_cancellation(cancel);
    let report = orchestrator.run(&ids(&["P1", "P2"])).await.unwrap();

    assert!(report.parents.iter().all(ParentReport::is_failed));
    assert!(report.files.is_empty());
    assert!(orchestrator.writer().is_closed());
}

#[tokio::test]
async fn test_writer_failure_aborts_run() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("file-not-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let api = CatalogApi::default().parent("P1", &["A"]).known(&["A"]);
    let walker = EntityWalker::new(Arc::new(api), WalkerConfig::default());
    // Tiny threshold forces a commit on the first write
    let writer =
        PartitionedRecordWriter::new(WriterConfig::new(&blocker, date()).with_rotate_bytes(1));
    let orchestrator = IngestionOrchestrator::new(walker, writer, OrchestratorOptions::default());

    let err = orchestrator.run(&ids(&["P1"])).await.unwrap_err();

    assert!(matches!(err, Error::WriterIo { .. }));
    assert!(orchestrator.writer().is_closed());
}

#[tokio::test]
async fn test_from_config_rejects_invalid_config() {
    let err = IngestionOrchestrator::from_config(&IngestConfig::default(), CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, Error::MissingConfigField { .. }));
}
