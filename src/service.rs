//! Entry point for interactive requests.
//!
//! [`WatchService`] is built once at startup and shared with whatever handles
//! chat interactions. Every operation returns a view or a [`ServiceError`];
//! rendering is left to the caller.
use crate::action::UiAction;
use crate::cache::{ResultCache, ResultId};
use crate::catalog::{validate_query, Catalog, CatalogError, Chapter, TitleSummary};
use crate::error::{NotFoundKind, ServiceError};
use crate::pagination::{paginate, PageWindow};
use crate::progress::{ProgressTracker, UnreadView};
use crate::storage::{Database, ProgressUpdate, SubscribeOutcome, WatchlistEntry};
use std::sync::Arc;

/// Page sizes for the two listings.
#[derive(Debug, Clone, Copy)]
pub struct ListingSizes {
    pub search_page_size: u32,
    pub watchlist_page_size: u32,
    pub chapter_page_size: u32,
    pub max_chapter_pages: u32,
}

/// One page of search results, each paired with its cache handle.
#[derive(Debug, Clone)]
pub struct SearchView {
    pub query: String,
    pub window: PageWindow,
    pub results: Vec<(ResultId, TitleSummary)>,
}

impl SearchView {
    /// Action for the previous/next buttons, if that page exists.
    pub fn page_action(&self, page: Option<u32>) -> Option<UiAction> {
        page.map(|page| UiAction::SearchPage {
            page,
            query: self.query.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistView {
    pub window: PageWindow,
    pub entries: Vec<WatchlistEntry>,
}

/// What a handled [`UiAction`] produced.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Search(SearchView),
    Subscribed {
        title: TitleSummary,
        outcome: SubscribeOutcome,
    },
    Unsubscribed {
        title_id: String,
    },
    Watchlist(WatchlistView),
    Unread(UnreadView),
    MarkedRead {
        title_id: String,
        chapter_id: String,
        update: ProgressUpdate,
    },
    MarkedLatest {
        title_id: String,
        chapter: Chapter,
        update: ProgressUpdate,
    },
}

pub struct WatchService {
    db: Database,
    catalog: Arc<dyn Catalog>,
    cache: ResultCache,
    tracker: ProgressTracker,
    sizes: ListingSizes,
}

impl WatchService {
    pub fn new(db: Database, catalog: Arc<dyn Catalog>, sizes: ListingSizes) -> Self {
        let tracker = ProgressTracker::new(
            db.clone(),
            Arc::clone(&catalog),
            sizes.chapter_page_size,
            sizes.max_chapter_pages,
        );
        Self {
            db,
            catalog,
            cache: ResultCache::new(),
            tracker,
            sizes,
        }
    }

    /// Search the catalog and replace the result cache with this page.
    pub async fn search(&self, query: &str, page: u32) -> Result<SearchView, ServiceError> {
        let query = validate_query(query)?;
        let page = page.max(1);

        let mut results = self.catalog.search(query, page).await?;
        // Past the end: show the last page instead of an empty one
        if results.items.is_empty() && results.total_pages > 0 && page > results.total_pages {
            results = self.catalog.search(query, results.total_pages).await?;
        }

        let window =
            PageWindow::from_total_pages(page, results.total_pages, self.sizes.search_page_size);
        let ids = self.cache.reset_and_store(results.items.clone());
        tracing::debug!(
            query = %query,
            page = window.page,
            total_pages = window.total_pages,
            results = ids.len(),
            "Search completed"
        );

        Ok(SearchView {
            query: query.to_string(),
            window,
            results: ids.into_iter().zip(results.items).collect(),
        })
    }

    /// Subscribe `user_id` to the title behind a search result.
    ///
    /// A new title's baseline is its current latest chapter, so only chapters
    /// published from now on are announced.
    pub async fn subscribe(
        &self,
        user_id: &str,
        result: ResultId,
    ) -> Result<(TitleSummary, SubscribeOutcome), ServiceError> {
        let title = self.cache.lookup(result)?;

        if self
            .db
            .get_watchlist_entry(user_id, &title.title_id)
            .await?
            .is_some()
        {
            return Ok((title, SubscribeOutcome::AlreadySubscribed));
        }

        let baseline = match self.catalog.latest_chapter(&title.title_id).await {
            Ok(chapter) => Some(chapter.chapter_id),
            Err(CatalogError::NoChapters(_) | CatalogError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let entry = WatchlistEntry::new(&title.title_id, user_id, &title.name);
        let outcome = self.db.subscribe(&entry, baseline.as_deref()).await?;
        tracing::info!(
            user_id = %user_id,
            title_id = %title.title_id,
            baseline = ?baseline,
            outcome = ?outcome,
            "Subscription processed"
        );
        Ok((title, outcome))
    }

    pub async fn unsubscribe(&self, user_id: &str, title_id: &str) -> Result<(), ServiceError> {
        if !self.db.unsubscribe(title_id, user_id).await? {
            return Err(ServiceError::NotFound(NotFoundKind::WatchlistEntry {
                title_id: title_id.to_string(),
            }));
        }
        tracing::info!(user_id = %user_id, title_id = %title_id, "Unsubscribed");
        Ok(())
    }

    /// One page of the user's watchlist, ordered by title name.
    pub async fn list_watchlist(
        &self,
        user_id: &str,
        page: u32,
    ) -> Result<WatchlistView, ServiceError> {
        let total = self.db.count_watchlist(user_id).await?;
        let window = paginate(total, page, self.sizes.watchlist_page_size)?;
        let entries = if window.is_empty() {
            Vec::new()
        } else {
            self.db
                .get_watchlist_window(user_id, window.offset, self.sizes.watchlist_page_size)
                .await?
        };
        Ok(WatchlistView { window, entries })
    }

    pub async fn list_unread(
        &self,
        user_id: &str,
        title_id: &str,
    ) -> Result<UnreadView, ServiceError> {
        self.tracker.list_unread(user_id, title_id).await
    }

    pub async fn mark_read(
        &self,
        user_id: &str,
        title_id: &str,
        chapter_id: &str,
        chapter_number: f64,
    ) -> Result<ProgressUpdate, ServiceError> {
        self.tracker
            .record_progress(user_id, title_id, chapter_id, chapter_number)
            .await
    }

    pub async fn mark_latest(
        &self,
        user_id: &str,
        title_id: &str,
    ) -> Result<(Chapter, ProgressUpdate), ServiceError> {
        self.tracker.mark_latest(user_id, title_id).await
    }

    /// Run a decoded UI action on behalf of `user_id`.
    pub async fn handle(
        &self,
        user_id: &str,
        action: UiAction,
    ) -> Result<ActionOutcome, ServiceError> {
        let outcome = match action {
            UiAction::Subscribe { result } => {
                let (title, outcome) = self.subscribe(user_id, result).await?;
                ActionOutcome::Subscribed { title, outcome }
            }
            UiAction::Unsubscribe { title_id } => {
                self.unsubscribe(user_id, &title_id).await?;
                ActionOutcome::Unsubscribed { title_id }
            }
            UiAction::SearchPage { page, query } => {
                ActionOutcome::Search(self.search(&query, page).await?)
            }
            UiAction::WatchlistPage { page } => {
                ActionOutcome::Watchlist(self.list_watchlist(user_id, page).await?)
            }
            UiAction::ListUnread { title_id } => {
                ActionOutcome::Unread(self.list_unread(user_id, &title_id).await?)
            }
            UiAction::MarkRead {
                title_id,
                chapter_id,
                chapter_number,
            } => {
                let update = self
                    .mark_read(user_id, &title_id, &chapter_id, chapter_number)
                    .await?;
                ActionOutcome::MarkedRead {
                    title_id,
                    chapter_id,
                    update,
                }
            }
            UiAction::MarkLatest { title_id } => {
                let (chapter, update) = self.mark_latest(user_id, &title_id).await?;
                ActionOutcome::MarkedLatest {
                    title_id,
                    chapter,
                    update,
                }
            }
        };
        Ok(outcome)
    }

    /// Decode a component identifier and run it.
    pub async fn handle_encoded(
        &self,
        user_id: &str,
        raw: &str,
    ) -> Result<ActionOutcome, ServiceError> {
        let action = UiAction::decode(raw).map_err(|e| {
            tracing::debug!(user_id = %user_id, raw = %raw, error = %e, "Rejected UI action");
            ServiceError::from(e)
        })?;
        self.handle(user_id, action).await
    }
}
