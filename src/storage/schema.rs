use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// Shared handle to the watchlist store.
///
/// Cloning is cheap (the pool is reference counted); the update cycle and every
/// interactive handler hold their own clone.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process holds the
    /// database lock (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Migration` if the schema could not be created.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Create the file with user-only permissions before SQLite touches it
        #[cfg(unix)]
        if path != ":memory:" {
            let db_path = std::path::Path::new(path);
            if !db_path.exists() {
                if let Some(parent) = db_path.parent().filter(|p| p.exists()) {
                    use std::os::unix::fs::OpenOptionsExt;
                    tracing::debug!(dir = %parent.display(), "Creating database file");
                    let _file = std::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .mode(0o600)
                        .open(db_path)
                        .ok(); // If creation fails, SQLite will report the error at connect_with.
                }
            }
        }

        // busy_timeout=5000: handlers and the update cycle write concurrently;
        // SQLite waits up to 5 seconds for the lock instead of failing.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
            {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// Every statement uses `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // One row per (title, user): the subscription plus personal progress
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watchlist (
                title_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                title_name TEXT NOT NULL,
                progress_chapter_id TEXT,
                progress_chapter_number REAL,
                PRIMARY KEY (title_id, user_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // One row per title regardless of subscriber count
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notification_baselines (
                title_id TEXT PRIMARY KEY,
                latest_known_chapter_id TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Watchlist listing filters by user and sorts by title name
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_watchlist_user_name ON watchlist(user_id, title_name)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_creates_tables() {
        let db = Database::open(":memory:").await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(names.contains(&"watchlist"));
        assert!(names.contains(&"notification_baselines"));
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = std::env::temp_dir().join("chapterwatch_schema_test_file");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("watch.db");
        let _ = std::fs::remove_file(&path);

        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());
        drop(db);

        std::fs::remove_dir_all(&dir).ok();
    }
}
