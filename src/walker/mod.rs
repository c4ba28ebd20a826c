//! Entity walker module
//!
//! Implements the three-stage fetch for one parent entity:
//!
//! ```text
//! get_parent ──▶ list_children (paginated, capped) ──▶ get_children_details (batched)
//!                                                          │
//!                                                          ▼
//!                                                     reconcile()
//! ```
//!
//! Stages run in order; detail batches run concurrently. Every network call
//! goes through the same [`EntityApi`] and therefore the same rate limiter.

mod reconcile;

pub use reconcile::{reconcile, Reconciliation};

use crate::api::{ChildDetail, EntityApi, MAX_IDS_PER_DETAIL_REQUEST, MAX_LISTING_PAGE_SIZE};
use crate::error::Error;
use crate::pagination::{NextPage, PageTokenPaginator, PaginationState};
use crate::types::{ChildRef, JsonValue};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for a walk
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Hard cap on children per parent (0 = unlimited)
    pub max_children: usize,
    /// IDs per detail request
    pub detail_batch_size: usize,
    /// Detail requests in flight per parent
    pub detail_concurrency: usize,
    /// Listing page size
    pub page_size: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            max_children: 50,
            detail_batch_size: MAX_IDS_PER_DETAIL_REQUEST,
            detail_concurrency: 2,
            page_size: MAX_LISTING_PAGE_SIZE,
        }
    }
}

impl WalkerConfig {
    /// Create a new walker config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the children cap
    #[must_use]
    pub fn with_max_children(mut self, max: usize) -> Self {
        self.max_children = max;
        self
    }

    /// Set the detail batch size
    #[must_use]
    pub fn with_detail_batch_size(mut self, size: usize) -> Self {
        self.detail_batch_size = size;
        self
    }

    /// Set the detail concurrency
    #[must_use]
    pub fn with_detail_concurrency(mut self, concurrency: usize) -> Self {
        self.detail_concurrency = concurrency;
        self
    }
}

/// Stage of a walk, for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStage {
    Parent,
    ListChildren,
    ChildDetails,
}

impl fmt::Display for WalkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WalkStage::Parent => "parent",
            WalkStage::ListChildren => "list_children",
            WalkStage::ChildDetails => "child_details",
        })
    }
}

/// A detail batch that failed terminally
#[derive(Debug)]
pub struct BatchFailure {
    /// IDs of the batch
    pub child_ids: Vec<String>,
    /// Why it failed
    pub error: Error,
}

/// What the listing stage produced
#[derive(Debug)]
pub enum Children {
    /// The parent has no children
    Empty,
    /// Children were listed and reconciled
    Reconciled(Reconciliation),
}

/// Result of a walk that got past the parent lookup and listing
#[derive(Debug)]
pub struct WalkReport {
    /// Parent identifier
    pub parent_id: String,
    /// Parent payload
    pub parent: JsonValue,
    /// Reconciled children
    pub children: Children,
    /// Detail batches that failed
    pub batch_failures: Vec<BatchFailure>,
}

impl WalkReport {
    /// Whether some detail batches failed
    pub fn is_partial(&self) -> bool {
        !self.batch_failures.is_empty()
    }

    /// IDs of every failed detail batch
    pub fn failed_child_ids(&self) -> Vec<String> {
        self.batch_failures
            .iter()
            .flat_map(|f| f.child_ids.iter().cloned())
            .collect()
    }
}

/// A walk that was aborted
#[derive(Debug, thiserror::Error)]
#[error("walk of {parent_id} failed at {stage}: {error}")]
pub struct WalkFailure {
    /// Parent identifier
    pub parent_id: String,
    /// Stage that failed
    pub stage: WalkStage,
    /// Underlying error
    #[source]
    pub error: Error,
    /// Parent payload, when the parent lookup had already succeeded
    pub parent: Option<JsonValue>,
}

/// Walks one parent entity at a time
#[derive(Clone)]
pub struct EntityWalker {
    api: Arc<dyn EntityApi>,
    config: WalkerConfig,
}

impl EntityWalker {
    /// Create a walker over an API
    pub fn new(api: Arc<dyn EntityApi>, config: WalkerConfig) -> Self {
        Self { api, config }
    }

    /// Walker configuration
    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    /// Walk one parent through all three stages
    pub async fn walk(&self, parent_id: &str) -> Result<WalkReport, WalkFailure> {
        let parent = self
            .api
            .get_parent(parent_id)
            .await
            .map_err(|error| WalkFailure {
                parent_id: parent_id.to_string(),
                stage: WalkStage::Parent,
                error,
                parent: None,
            })?;

        let listed = match self.list_children(parent_id).await {
            Ok(listed) => listed,
            Err(error) => {
                return Err(WalkFailure {
                    parent_id: parent_id.to_string(),
                    stage: WalkStage::ListChildren,
                    error,
                    parent: Some(parent),
                })
            }
        };

        if listed.is_empty() {
            info!(parent_id, "No children found");
            return Ok(WalkReport {
                parent_id: parent_id.to_string(),
                parent,
                children: Children::Empty,
                batch_failures: Vec::new(),
            });
        }

        let (returned, batch_failures) = self.fetch_details(&listed).await;

        let failed: HashSet<String> = batch_failures
            .iter()
            .flat_map(|f| f.child_ids.iter().cloned())
            .collect();
        let reconciliation = reconcile(&listed, returned, &failed);

        if reconciliation.unlisted > 0 {
            debug!(
                parent_id,
                unlisted = reconciliation.unlisted,
                "Ignored details for children that were not listed"
            );
        }
        info!(
            parent_id,
            listed = listed.len(),
            found = reconciliation.found.len(),
            missing = reconciliation.missing.len(),
            failed = failed.len(),
            "Walk complete"
        );

        Ok(WalkReport {
            parent_id: parent_id.to_string(),
            parent,
            children: Children::Reconciled(reconciliation),
            batch_failures,
        })
    }

    /// Page through the child listing until exhausted or capped
    ///
    /// IDs are de-duplicated in first-seen order.
    pub async fn list_children(&self, parent_id: &str) -> crate::Result<Vec<ChildRef>> {
        let paginator = PageTokenPaginator::new(self.config.page_size, self.config.max_children);
        let mut state = PaginationState::new();
        let mut seen = HashSet::new();
        let mut sent_tokens = HashSet::new();
        let mut children = Vec::new();

        while let Some(request) = paginator.next_request(&state) {
            if let Some(token) = &request.page_token {
                sent_tokens.insert(token.clone());
            }
            let page = self.api.list_children(parent_id, &request).await?;
            let listed = page.child_ids.len();

            let fresh: Vec<String> = page
                .child_ids
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect();
            let kept = paginator.accept(&state, fresh.len());
            if kept < fresh.len() {
                debug!(parent_id, dropped = fresh.len() - kept, "Child cap reached");
            }
            children.extend(
                fresh
                    .into_iter()
                    .take(kept)
                    .map(|id| ChildRef::new(id, parent_id)),
            );

            // A token already sent, or a page of only known IDs, means the
            // listing is cycling
            let repeated = page
                .next_page_token
                .as_ref()
                .is_some_and(|token| sent_tokens.contains(token));
            let stalled = listed > 0 && kept == 0;

            match paginator.process_page(kept, page.next_page_token, &mut state) {
                NextPage::Continue { .. } if repeated || stalled => {
                    warn!(
                        parent_id,
                        pages = state.pages,
                        repeated,
                        stalled,
                        "Listing stopped making progress"
                    );
                    break;
                }
                NextPage::Continue { .. } => {}
                NextPage::Done => break,
            }
        }

        debug!(
            parent_id,
            children = children.len(),
            pages = state.pages,
            "Listing complete"
        );
        Ok(children)
    }

    /// Fetch details for all listed children in concurrent batches
    async fn fetch_details(&self, listed: &[ChildRef]) -> (Vec<ChildDetail>, Vec<BatchFailure>) {
        let batch_size = self
            .config
            .detail_batch_size
            .clamp(1, MAX_IDS_PER_DETAIL_REQUEST);
        let concurrency = self.config.detail_concurrency.max(1);

        let batches: Vec<Vec<String>> = listed
            .chunks(batch_size)
            .map(|chunk| chunk.iter().map(|c| c.id.clone()).collect())
            .collect();

        let results: Vec<(Vec<String>, crate::Result<Vec<ChildDetail>>)> = stream::iter(batches)
            .map(|ids| async move {
                let result = self.api.get_children_details(&ids).await;
                (ids, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut returned = Vec::new();
        let mut failures = Vec::new();
        for (ids, result) in results {
            match result {
                Ok(details) => returned.extend(details),
                Err(error) => {
                    warn!(
                        stage = %WalkStage::ChildDetails,
                        batch = ids.len(),
                        "Detail batch failed: {error}"
                    );
                    failures.push(BatchFailure {
                        child_ids: ids,
                        error,
                    });
                }
            }
        }
        (returned, failures)
    }
}

impl fmt::Debug for EntityWalker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityWalker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
