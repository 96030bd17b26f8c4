//! Per-user reading progress and unread-chapter computation.
use crate::catalog::{Catalog, Chapter};
use crate::error::{NotFoundKind, ServiceError};
use crate::storage::{Database, ProgressUpdate, WatchlistEntry};
use std::collections::HashSet;
use std::sync::Arc;

/// Chapters published after the user's recorded progress.
///
/// With no progress every chapter is unread. The result is sorted by ascending
/// ordinal (ties broken by chapter id) with duplicate chapter ids collapsed.
pub fn compute_unread(entry: &WatchlistEntry, chapters: &[Chapter]) -> Vec<Chapter> {
    let mut seen = HashSet::new();
    let mut unread: Vec<Chapter> = chapters
        .iter()
        .filter(|c| match entry.progress_chapter_number {
            Some(read) => c.number > read,
            None => true,
        })
        .filter(|c| seen.insert(c.chapter_id.as_str()))
        .cloned()
        .collect();
    unread.sort_by(|a, b| {
        a.number
            .total_cmp(&b.number)
            .then_with(|| a.chapter_id.cmp(&b.chapter_id))
    });
    unread
}

/// Result of an unread-chapter listing.
#[derive(Debug, Clone, PartialEq)]
pub enum UnreadView {
    CaughtUp {
        title_name: String,
    },
    Unread {
        title_name: String,
        chapters: Vec<Chapter>,
        /// The chapter walk hit its page cap before reaching the user's progress.
        truncated: bool,
    },
}

pub struct ProgressTracker {
    db: Database,
    catalog: Arc<dyn Catalog>,
    chapter_page_size: u32,
    max_chapter_pages: u32,
}

impl ProgressTracker {
    pub fn new(
        db: Database,
        catalog: Arc<dyn Catalog>,
        chapter_page_size: u32,
        max_chapter_pages: u32,
    ) -> Self {
        Self {
            db,
            catalog,
            chapter_page_size: chapter_page_size.max(1),
            max_chapter_pages: max_chapter_pages.max(1),
        }
    }

    /// Record that `user_id` has read up to `chapter_id` of `title_id`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the user is not subscribed to the title;
    /// [`ServiceError::Validation`] for a negative or non-finite ordinal.
    pub async fn record_progress(
        &self,
        user_id: &str,
        title_id: &str,
        chapter_id: &str,
        chapter_number: f64,
    ) -> Result<ProgressUpdate, ServiceError> {
        if !chapter_number.is_finite() || chapter_number < 0.0 {
            return Err(ServiceError::Validation(format!(
                "invalid chapter number {}",
                chapter_number
            )));
        }
        if chapter_id.trim().is_empty() {
            return Err(ServiceError::Validation("chapter id is empty".to_string()));
        }

        let update = self
            .db
            .record_progress(user_id, title_id, chapter_id, chapter_number)
            .await?
            .ok_or_else(|| not_subscribed(title_id))?;

        match update {
            ProgressUpdate::Recorded => tracing::info!(
                user_id = %user_id,
                title_id = %title_id,
                chapter_id = %chapter_id,
                "Recorded reading progress"
            ),
            ProgressUpdate::Unchanged => tracing::debug!(
                user_id = %user_id,
                title_id = %title_id,
                chapter_id = %chapter_id,
                "Progress already further along, left unchanged"
            ),
        }
        Ok(update)
    }

    /// Mark the newest chapter in the catalog as read.
    ///
    /// # Errors
    ///
    /// [`NotFoundKind::Chapter`] when the title has nothing published yet;
    /// [`NotFoundKind::Title`] when the catalog no longer knows the title.
    pub async fn mark_latest(
        &self,
        user_id: &str,
        title_id: &str,
    ) -> Result<(Chapter, ProgressUpdate), ServiceError> {
        self.require_entry(user_id, title_id).await?;
        let latest = self.catalog.latest_chapter(title_id).await?;
        let update = self
            .record_progress(user_id, title_id, &latest.chapter_id, latest.number)
            .await?;
        Ok((latest, update))
    }

    /// List the user's unread chapters for a subscribed title.
    pub async fn list_unread(
        &self,
        user_id: &str,
        title_id: &str,
    ) -> Result<UnreadView, ServiceError> {
        let entry = self.require_entry(user_id, title_id).await?;

        let mut fetched = Vec::new();
        let mut truncated = false;
        for page in 1..=self.max_chapter_pages {
            let batch = self
                .catalog
                .chapters(title_id, page, self.chapter_page_size)
                .await?;
            let short = batch.len() < self.chapter_page_size as usize;
            // Pages are newest first, so once progress is reached older pages are all read
            let reached_progress = match entry.progress_chapter_number {
                Some(read) => batch.iter().any(|c| c.number <= read),
                None => false,
            };
            fetched.extend(batch);
            if short || reached_progress {
                break;
            }
            if page == self.max_chapter_pages {
                truncated = true;
            }
        }

        let chapters = compute_unread(&entry, &fetched);
        tracing::debug!(
            user_id = %user_id,
            title_id = %title_id,
            unread = chapters.len(),
            truncated,
            "Computed unread chapters"
        );
        if chapters.is_empty() {
            return Ok(UnreadView::CaughtUp {
                title_name: entry.title_name,
            });
        }
        Ok(UnreadView::Unread {
            title_name: entry.title_name,
            chapters,
            truncated,
        })
    }

    async fn require_entry(
        &self,
        user_id: &str,
        title_id: &str,
    ) -> Result<WatchlistEntry, ServiceError> {
        self.db
            .get_watchlist_entry(user_id, title_id)
            .await?
            .ok_or_else(|| not_subscribed(title_id))
    }
}

fn not_subscribed(title_id: &str) -> ServiceError {
    ServiceError::NotFound(NotFoundKind::WatchlistEntry {
        title_id: title_id.to_string(),
    })
}
