use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Another instance of chapterwatch appears to be running. Please stop it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A user's subscription to a title plus their personal reading marker.
///
/// `progress_chapter_number` is `None` until the user records progress for the
/// first time; every chapter counts as unread in that state.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WatchlistEntry {
    pub title_id: String,
    pub user_id: String,
    pub title_name: String,
    pub progress_chapter_id: Option<String>,
    pub progress_chapter_number: Option<f64>,
}

impl WatchlistEntry {
    /// New entry with no reading progress recorded yet.
    pub fn new(
        title_id: impl Into<String>,
        user_id: impl Into<String>,
        title_name: impl Into<String>,
    ) -> Self {
        Self {
            title_id: title_id.into(),
            user_id: user_id.into(),
            title_name: title_name.into(),
            progress_chapter_id: None,
            progress_chapter_number: None,
        }
    }
}

/// The last chapter a notification was attempted for, one row per title.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct NotificationBaseline {
    pub title_id: String,
    /// `None` when the title had no chapters at first subscription.
    pub latest_known_chapter_id: Option<String>,
}

/// Result of inserting a watchlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadySubscribed,
}

/// Result of recording reading progress on an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// Progress moved to (or was re-recorded at) the given chapter.
    Recorded,
    /// The stored progress is already past the given chapter; nothing changed.
    Unchanged,
}
