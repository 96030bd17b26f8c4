//! Page-window arithmetic shared by the search and watchlist listings.
//!
//! Everything here is pure: callers compute a [`PageWindow`] and then run their
//! own windowed fetch with the returned offset.
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("Page size must be greater than zero")]
    ZeroPageSize,
}

/// One page of a listing, with previous/next affordances.
///
/// `previous` and `next` are `None` when the target page lies outside
/// `[1, total_pages]`; the UI must render those controls as unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// The page actually shown, after clamping.
    pub page: u32,
    /// `0` means the listing is empty.
    pub total_pages: u32,
    /// Number of items to skip before this page.
    pub offset: u64,
    pub previous: Option<u32>,
    pub next: Option<u32>,
}

impl PageWindow {
    /// Build a window from a page count the remote side already computed.
    ///
    /// Used by catalog search, which reports its own `total_page`.
    pub fn from_total_pages(page: u32, total_pages: u32, page_size: u32) -> Self {
        let page = clamp_page(page, total_pages);
        let previous = if page > 1 { Some(page - 1) } else { None };
        let next = if page < total_pages {
            Some(page + 1)
        } else {
            None
        };
        Self {
            page,
            total_pages,
            offset: u64::from(page - 1) * u64::from(page_size),
            previous,
            next,
        }
    }

    /// True when there is nothing to show.
    pub fn is_empty(&self) -> bool {
        self.total_pages == 0
    }

    /// Human-readable position, e.g. "Page 2 / 4".
    pub fn label(&self) -> String {
        format!("Page {} / {}", self.page, self.total_pages.max(1))
    }
}

/// Compute the window for `page` over `total_items` items.
///
/// Page 0 clamps to 1 and pages past the end clamp to the last page, so the
/// returned `page` is always in `[1, max(total_pages, 1)]`.
///
/// # Errors
///
/// Returns [`PaginationError::ZeroPageSize`] if `page_size` is 0.
pub fn paginate(total_items: u64, page: u32, page_size: u32) -> Result<PageWindow, PaginationError> {
    if page_size == 0 {
        return Err(PaginationError::ZeroPageSize);
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    let total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
    Ok(PageWindow::from_total_pages(page, total_pages, page_size))
}

fn clamp_page(page: u32, total_pages: u32) -> u32 {
    page.max(1).min(total_pages.max(1))
}
