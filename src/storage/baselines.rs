use anyhow::Result;

use super::schema::Database;
use super::types::NotificationBaseline;

impl Database {
    // ========================================================================
    // Notification Baseline Operations
    // ========================================================================

    /// Baselines for every title that still has at least one subscriber,
    /// ordered by title id.
    pub async fn get_tracked_titles(&self) -> Result<Vec<NotificationBaseline>> {
        let rows = sqlx::query_as::<_, NotificationBaseline>(
            r#"
            SELECT b.title_id, b.latest_known_chapter_id
            FROM notification_baselines b
            WHERE EXISTS (SELECT 1 FROM watchlist w WHERE w.title_id = b.title_id)
            ORDER BY b.title_id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The baseline row for one title.
    pub async fn get_baseline(&self, title_id: &str) -> Result<Option<NotificationBaseline>> {
        let row = sqlx::query_as::<_, NotificationBaseline>(
            "SELECT title_id, latest_known_chapter_id FROM notification_baselines WHERE title_id = ?",
        )
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Move a title's baseline to `chapter_id` in a single statement.
    ///
    /// Returns `false` if the baseline no longer exists (the last subscriber
    /// left while the cycle was running).
    pub async fn advance_baseline(&self, title_id: &str, chapter_id: &str) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE notification_baselines SET latest_known_chapter_id = ? WHERE title_id = ?",
        )
        .bind(chapter_id)
        .bind(title_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// A title's name as stored on any watchlist entry.
    ///
    /// Used as the notification title when the catalog detail lookup fails.
    pub async fn get_title_name(&self, title_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT title_name FROM watchlist WHERE title_id = ? LIMIT 1")
                .bind(title_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(name,)| name))
    }
}
