use super::schema::Database;
use super::types::{Feed, StorageError};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a new feed owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FeedExists` when the URL is already registered
    /// (URL uniqueness is enforced by the store).
    pub async fn add_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, StorageError> {
        let now = Self::now();
        sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (name, url, user_id, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, url, user_id, last_fetched_at, updated_at
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if StorageError::is_unique_violation(&e) {
                StorageError::FeedExists(url.to_string())
            } else {
                StorageError::Other(e)
            }
        })
    }

    /// All registered feeds in id order
    pub async fn all_feeds(&self) -> Result<Vec<Feed>, StorageError> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, user_id, last_fetched_at, updated_at
            FROM feeds
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }

    pub async fn feed_by_url(&self, url: &str) -> Result<Option<Feed>, StorageError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, user_id, last_fetched_at, updated_at
            FROM feeds
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    /// Claim the next feed for polling: select the least-recently-fetched feed
    /// and stamp it, in one atomic statement.
    ///
    /// Never-polled feeds (null `last_fetched_at`) sort before any timestamp;
    /// ties break on feed id so rotation order is deterministic. Selection and
    /// stamp are a single conditional UPDATE, so two concurrent claimants
    /// (overlapping ticks, a second scheduler, a one-off fetch racing the
    /// loop) can never pick the same feed.
    ///
    /// Returns `None` when no feeds are registered.
    pub async fn claim_next_feed(&self) -> Result<Option<Feed>, StorageError> {
        let now = Self::now();
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = (
                SELECT id FROM feeds
                ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
                LIMIT 1
            )
            RETURNING id, name, url, user_id, last_fetched_at, updated_at
        "#,
        )
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    /// Stamp a feed's `last_fetched_at` to now.
    ///
    /// The pipeline calls this right after a successful fetch, before per-item
    /// processing, so fetch success is recorded regardless of per-item outcomes.
    pub async fn mark_feed_fetched(&self, feed_id: i64) -> Result<(), StorageError> {
        let now = Self::now();
        sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
