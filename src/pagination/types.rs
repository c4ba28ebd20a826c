//! Pagination types
//!
//! Page-token pagination with a hard item cap.

/// Result of processing one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available starting at this token
    Continue {
        /// Token to send with the next request
        page_token: String,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }
}

/// Parameters for the next page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Token from the previous page, `None` for the first page
    pub page_token: Option<String>,
    /// Maximum items to ask for
    pub max_results: usize,
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Token for the next page
    pub cursor: Option<String>,
    /// Pages fetched so far
    pub pages: u32,
    /// Items accepted so far
    pub total_fetched: usize,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Set cursor
    pub fn set_cursor(&mut self, cursor: String) {
        self.cursor = Some(cursor);
    }

    /// Add to total fetched
    pub fn add_fetched(&mut self, count: usize) {
        self.total_fetched += count;
    }
}

/// Page-token paginator (YouTube `search.list` style)
///
/// `max_items == 0` means no cap. With a cap, each request asks for at most
/// the remaining count and pagination stops as soon as the cap is met.
#[derive(Debug, Clone)]
pub struct PageTokenPaginator {
    /// Largest page the provider accepts
    pub page_size: usize,
    /// Hard cap on accepted items (0 = unlimited)
    pub max_items: usize,
}

impl PageTokenPaginator {
    /// Create a new page-token paginator
    pub fn new(page_size: usize, max_items: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            max_items,
        }
    }

    /// Items still allowed under the cap, `None` when uncapped
    pub fn remaining(&self, state: &PaginationState) -> Option<usize> {
        (self.max_items > 0).then(|| self.max_items.saturating_sub(state.total_fetched))
    }

    /// Parameters for the next request, or `None` when pagination is over
    pub fn next_request(&self, state: &PaginationState) -> Option<PageRequest> {
        if state.done {
            return None;
        }
        let max_results = match self.remaining(state) {
            Some(0) => return None,
            Some(remaining) => remaining.min(self.page_size),
            None => self.page_size,
        };
        Some(PageRequest {
            page_token: state.cursor.clone(),
            max_results,
        })
    }

    /// How many of `received` items of a page may be kept
    pub fn accept(&self, state: &PaginationState, received: usize) -> usize {
        self.remaining(state)
            .map_or(received, |remaining| received.min(remaining))
    }

    /// Record a processed page and decide whether to continue
    ///
    /// `accepted` is the number of items actually kept from this page.
    pub fn process_page(
        &self,
        accepted: usize,
        next_page_token: Option<String>,
        state: &mut PaginationState,
    ) -> NextPage {
        state.pages += 1;
        state.add_fetched(accepted);

        if self.remaining(state) == Some(0) {
            state.mark_done();
            return NextPage::Done;
        }

        match next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => {
                state.set_cursor(token.clone());
                NextPage::Continue { page_token: token }
            }
            None => {
                state.mark_done();
                NextPage::Done
            }
        }
    }
}
