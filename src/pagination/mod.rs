//! Pagination module
//!
//! Supports page-token pagination (`pageToken` in, `nextPageToken` out)
//! with a hard cap on the number of items collected.
//!
//! # Overview
//!
//! The paginator decides what to ask for next and when to stop. It holds no
//! I/O: callers fetch a page, report what came back, and ask again.

mod types;

pub use types::{NextPage, PageRequest, PageTokenPaginator, PaginationState};
