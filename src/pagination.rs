//! This modules defines the common functionality for paging data.
//!
//! [PageCursor] describes the page of remote data a store currently holds.
//! [create_pagination_indicators] builds the page controls shown under a list.

use serde::{Deserialize, Serialize};

/// The config for pagination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// The page to load when none is given.
    pub default_page: u64,
    /// The number of rows per page. Matches the page size used by the API.
    pub page_size: u64,
    /// The maximum number of pages to show in the pagination indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            page_size: 10,
            max_pages: 5,
        }
    }
}

/// The position of the page a store holds within a remote list.
///
/// A cursor is only ever replaced by a fetch, never adjusted by local edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// The 1-based page currently held.
    pub current_page: u64,
    /// The number of pages in the remote list.
    pub total_pages: u64,
    /// The number of items in the remote list, if the endpoint reports it.
    pub total_count: Option<u64>,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_count: None,
        }
    }
}

impl PageCursor {
    /// Whether there is a page after the current one.
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Whether there is a page before the current one.
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// The page to load after the last item of the current page was removed.
    ///
    /// Steps back one page when `remaining` items are left on a page that is
    /// not the first, otherwise stays on the current page.
    pub fn page_after_removal(&self, remaining: usize) -> u64 {
        if remaining == 0 && self.current_page > 1 {
            self.current_page - 1
        } else {
            self.current_page
        }
    }
}

/// One control in the row of page links under a list.
#[derive(Debug, PartialEq, Eq)]
pub enum PaginationIndicator {
    /// A link to another page.
    Page(u64),
    /// The page being shown.
    CurrPage(u64),
    /// A gap in the page links.
    Ellipsis,
    /// A link to the next page.
    NextButton(u64),
    /// A link to the previous page.
    BackButton(u64),
}

/// Build the page controls for `curr_page` of `page_count` pages, showing at
/// most `max_pages` page links around the current page.
pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    let map_page = |page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    };

    let mut indicators: Vec<PaginationIndicator> = if page_count <= max_pages {
        (1..=page_count).map(map_page).collect()
    } else if curr_page <= (max_pages / 2) {
        (1..=max_pages).map(map_page).collect()
    } else if curr_page > (page_count - max_pages / 2) {
        ((page_count - max_pages + 1)..=page_count)
            .map(map_page)
            .collect()
    } else {
        ((curr_page - max_pages / 2)..=(curr_page + max_pages / 2))
            .map(map_page)
            .collect()
    };

    if page_count > max_pages {
        if curr_page > (max_pages / 2) + 1 {
            indicators.insert(0, PaginationIndicator::Page(1));
            indicators.insert(1, PaginationIndicator::Ellipsis);
        }

        if curr_page < (page_count - max_pages / 2) {
            indicators.push(PaginationIndicator::Ellipsis);
            indicators.push(PaginationIndicator::Page(page_count));
        }
    }

    if curr_page > 1 {
        indicators.insert(0, PaginationIndicator::BackButton(curr_page - 1));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}
