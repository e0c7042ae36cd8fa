//! Resumable pagination as an explicit state machine.
//!
//! ```text
//! AwaitingFirstPage --page--> HasCursor(token) --page--> ... --> Exhausted
//!        ^ resume with a stored token starts directly in HasCursor
//! ```
//!
//! Transitions are pure; the engine owns the fetching.

use creatordb_core::HarvestCursor;

use crate::extract::PageSignal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    AwaitingFirstPage,
    HasCursor(String),
    Exhausted,
}

impl PageState {
    /// Initial state: resume from `stored` when asked and it is resumable.
    #[must_use]
    pub fn start(stored: Option<&HarvestCursor>, resume: bool) -> Self {
        match stored.and_then(HarvestCursor::resumable_token) {
            Some(token) if resume => PageState::HasCursor(token.to_owned()),
            _ => PageState::AwaitingFirstPage,
        }
    }

    /// State after a page was fetched and yielded `signal`.
    ///
    /// A missing token, an explicit `has_more: false`, or a token equal to the
    /// one just used (a cycling cursor) all end pagination.
    #[must_use]
    pub fn advance(&self, signal: &PageSignal) -> Self {
        if self == &PageState::Exhausted || signal.has_more == Some(false) {
            return PageState::Exhausted;
        }
        match signal.next_cursor.as_deref().map(str::trim) {
            Some(next) if !next.is_empty() && self.token() != Some(next) => {
                PageState::HasCursor(next.to_owned())
            }
            _ => PageState::Exhausted,
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            PageState::HasCursor(token) => Some(token),
            _ => None,
        }
    }

    /// The persisted form of this state.
    #[must_use]
    pub fn to_cursor(&self) -> HarvestCursor {
        match self {
            PageState::AwaitingFirstPage => HarvestCursor::default(),
            PageState::HasCursor(token) => HarvestCursor::at(token.clone()),
            PageState::Exhausted => HarvestCursor::exhausted(),
        }
    }
}

/// Hard bounds on one harvest, independent of what upstream says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBudget {
    /// Every page fetch counts, including the profile page.
    pub max_pages: usize,
    pub max_items: usize,
}

impl PageBudget {
    #[must_use]
    pub fn allows_page(&self, pages_fetched: usize) -> bool {
        pages_fetched < self.max_pages
    }

    /// How many more items fit.
    #[must_use]
    pub fn items_left(&self, items_collected: usize) -> usize {
        self.max_items.saturating_sub(items_collected)
    }
}

/// Why the paginator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Upstream signalled the end, or the cursor cycled.
    Exhausted,
    PageBudget,
    ItemBudget,
    /// A page produced nothing that had not been seen already.
    NoNewItems,
    FetchFailed,
    RateLimited,
    Deadline,
    /// Content fetching was not requested.
    NotRequested,
}

impl StopReason {
    /// Whether stopping here leaves the harvest partial.
    #[must_use]
    pub fn is_degraded(self) -> bool {
        matches!(
            self,
            StopReason::FetchFailed | StopReason::RateLimited | StopReason::Deadline
        )
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::Exhausted => "exhausted",
            StopReason::PageBudget => "page budget reached",
            StopReason::ItemBudget => "item budget reached",
            StopReason::NoNewItems => "page yielded no new items",
            StopReason::FetchFailed => "page fetch failed",
            StopReason::RateLimited => "rate limited",
            StopReason::Deadline => "deadline exceeded",
            StopReason::NotRequested => "content not requested",
        };
        f.write_str(text)
    }
}
