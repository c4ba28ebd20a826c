//! Remote API module
//!
//! The [`EntityApi`] trait is the seam between the walker and the network:
//! three logical operations for the parent → children → details pattern.
//! [`YouTubeApi`] implements it over the YouTube Data API v3 through a
//! [`crate::http::ResilientClient`]; tests plug in in-memory fakes.

mod youtube;

pub use youtube::{YouTubeApi, CHANNEL_PARTS, VIDEO_PARTS, YOUTUBE_API_URL};

use crate::error::Result;
use crate::pagination::PageRequest;
use async_trait::async_trait;
use serde_json::Value;

/// Provider-imposed maximum of IDs per detail request
pub const MAX_IDS_PER_DETAIL_REQUEST: usize = 50;

/// Provider-imposed maximum page size of the child listing
pub const MAX_LISTING_PAGE_SIZE: usize = 50;

/// One page of child IDs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildPage {
    /// Child IDs in listing order
    pub child_ids: Vec<String>,
    /// Token of the next page, if any
    pub next_page_token: Option<String>,
}

/// Full details of one child entity
#[derive(Debug, Clone, PartialEq)]
pub struct ChildDetail {
    /// Child identifier
    pub id: String,
    /// Opaque payload as returned by the provider
    pub payload: Value,
}

/// Remote operations the walker needs
#[async_trait]
pub trait EntityApi: Send + Sync {
    /// Fetch parent metadata
    ///
    /// Unknown parents fail with `Error::NotFound`, bad credentials with
    /// `Error::Auth`.
    async fn get_parent(&self, parent_id: &str) -> Result<Value>;

    /// Fetch one page of child IDs for a parent
    async fn list_children(&self, parent_id: &str, page: &PageRequest) -> Result<ChildPage>;

    /// Fetch details for a batch of child IDs
    ///
    /// IDs the provider does not know are simply absent from the result.
    async fn get_children_details(&self, child_ids: &[String]) -> Result<Vec<ChildDetail>>;
}
