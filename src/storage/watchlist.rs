use anyhow::Result;

use super::schema::Database;
use super::types::{ProgressUpdate, SubscribeOutcome, WatchlistEntry};

impl Database {
    // ========================================================================
    // Subscription Operations
    // ========================================================================

    /// Add a title to a user's watchlist.
    ///
    /// Creates the title's notification baseline at `baseline_chapter_id` if
    /// this is the first subscription. An existing baseline is never moved
    /// here; only the update cycle advances it.
    pub async fn subscribe(
        &self,
        entry: &WatchlistEntry,
        baseline_chapter_id: Option<&str>,
    ) -> Result<SubscribeOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO watchlist
                (title_id, user_id, title_name, progress_chapter_id, progress_chapter_number)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(title_id, user_id) DO NOTHING
        "#,
        )
        .bind(&entry.title_id)
        .bind(&entry.user_id)
        .bind(&entry.title_name)
        .bind(&entry.progress_chapter_id)
        .bind(entry.progress_chapter_number)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO notification_baselines (title_id, latest_known_chapter_id)
            VALUES (?, ?)
            ON CONFLICT(title_id) DO NOTHING
        "#,
        )
        .bind(&entry.title_id)
        .bind(baseline_chapter_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(if inserted > 0 {
            SubscribeOutcome::Added
        } else {
            SubscribeOutcome::AlreadySubscribed
        })
    }

    /// Remove a title from a user's watchlist.
    ///
    /// Returns `false` if the user was not subscribed. When the last subscriber
    /// leaves, the title's baseline is dropped so the cycle stops checking it.
    pub async fn unsubscribe(&self, title_id: &str, user_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM watchlist WHERE title_id = ? AND user_id = ?")
            .bind(title_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed > 0 {
            let pruned = sqlx::query(
                r#"
                DELETE FROM notification_baselines
                WHERE title_id = ?
                  AND NOT EXISTS (SELECT 1 FROM watchlist WHERE title_id = ?)
            "#,
            )
            .bind(title_id)
            .bind(title_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if pruned > 0 {
                tracing::debug!(title_id = %title_id, "Last subscriber left, baseline pruned");
            }
        }

        tx.commit().await?;
        Ok(removed > 0)
    }

    /// Fetch one watchlist entry, if the user is subscribed to the title.
    pub async fn get_watchlist_entry(
        &self,
        user_id: &str,
        title_id: &str,
    ) -> Result<Option<WatchlistEntry>> {
        let entry = sqlx::query_as::<_, WatchlistEntry>(
            r#"
            SELECT title_id, user_id, title_name, progress_chapter_id, progress_chapter_number
            FROM watchlist
            WHERE user_id = ? AND title_id = ?
        "#,
        )
        .bind(user_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    // ========================================================================
    // Listing Operations
    // ========================================================================

    /// Number of titles on a user's watchlist.
    pub async fn count_watchlist(&self, user_id: &str) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM watchlist WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0.max(0) as u64)
    }

    /// One window of a user's watchlist, ordered by title name.
    ///
    /// Title id breaks ties so windows never overlap or skip rows.
    pub async fn get_watchlist_window(
        &self,
        user_id: &str,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<WatchlistEntry>> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let entries = sqlx::query_as::<_, WatchlistEntry>(
            r#"
            SELECT title_id, user_id, title_name, progress_chapter_id, progress_chapter_number
            FROM watchlist
            WHERE user_id = ?
            ORDER BY title_name ASC, title_id ASC
            LIMIT ? OFFSET ?
        "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// User ids subscribed to a title.
    pub async fn get_subscribers(&self, title_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT user_id FROM watchlist WHERE title_id = ? ORDER BY user_id")
                .bind(title_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
    }

    // ========================================================================
    // Progress Operations
    // ========================================================================

    /// Record reading progress on an existing watchlist entry.
    ///
    /// Returns `Ok(None)` if the user is not subscribed to the title. Progress
    /// never moves backwards: a chapter with a lower number than the stored one
    /// leaves the row untouched and reports [`ProgressUpdate::Unchanged`].
    pub async fn record_progress(
        &self,
        user_id: &str,
        title_id: &str,
        chapter_id: &str,
        chapter_number: f64,
    ) -> Result<Option<ProgressUpdate>> {
        let updated = sqlx::query(
            r#"
            UPDATE watchlist
            SET progress_chapter_id = ?, progress_chapter_number = ?
            WHERE user_id = ? AND title_id = ?
              AND (progress_chapter_number IS NULL OR progress_chapter_number <= ?)
        "#,
        )
        .bind(chapter_id)
        .bind(chapter_number)
        .bind(user_id)
        .bind(title_id)
        .bind(chapter_number)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated > 0 {
            return Ok(Some(ProgressUpdate::Recorded));
        }

        // Either no entry exists or the stored progress is further along
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM watchlist WHERE user_id = ? AND title_id = ?")
                .bind(user_id)
                .bind(title_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(exists.map(|_| ProgressUpdate::Unchanged))
    }
}
