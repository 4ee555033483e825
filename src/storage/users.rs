use super::schema::Database;
use super::types::{Feed, StorageError, User};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    pub async fn create_user(&self, name: &str) -> Result<User, StorageError> {
        let now = Self::now();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, created_at)
            VALUES (?, ?)
            RETURNING id, name, created_at
        "#,
        )
        .bind(name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if StorageError::is_unique_violation(&e) {
                StorageError::UserExists(name.to_string())
            } else {
                StorageError::Other(e)
            }
        })
    }

    /// Identity lookup used before human-triggered commands. `None` means not
    /// found; callers decide whether that is an error.
    pub async fn get_user_by_name(&self, name: &str) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, created_at FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn users(&self) -> Result<Vec<User>, StorageError> {
        let users =
            sqlx::query_as::<_, User>("SELECT id, name, created_at FROM users ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(users)
    }

    // ========================================================================
    // Feed Follows (read-only to the ingestion core)
    // ========================================================================

    /// Follow a feed. Following a feed twice is a no-op.
    pub async fn follow_feed(&self, user_id: i64, feed_id: i64) -> Result<(), StorageError> {
        let now = Self::now();
        sqlx::query(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, feed_id) DO NOTHING
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn unfollow_feed(&self, user_id: i64, feed_id: i64) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Feeds a user follows, in follow order
    pub async fn followed_feeds(&self, user_id: i64) -> Result<Vec<Feed>, StorageError> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT f.id, f.name, f.url, f.user_id, f.last_fetched_at, f.updated_at
            FROM feeds f
            JOIN feed_follows ff ON ff.feed_id = f.id
            WHERE ff.user_id = ?
            ORDER BY ff.id
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, StorageError};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let db = test_db().await;
        let created = db.create_user("alice").await.unwrap();

        let found = db.get_user_by_name("alice").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(db.get_user_by_name("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let db = test_db().await;
        db.create_user("alice").await.unwrap();

        let err = db.create_user("alice").await.unwrap_err();
        assert!(matches!(err, StorageError::UserExists(name) if name == "alice"));
    }

    #[tokio::test]
    async fn test_follow_unfollow_roundtrip() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .add_feed("Example", "https://example.com/rss", user.id)
            .await
            .unwrap();

        db.follow_feed(user.id, feed.id).await.unwrap();
        // Re-following is a no-op, not an error
        db.follow_feed(user.id, feed.id).await.unwrap();

        let followed = db.followed_feeds(user.id).await.unwrap();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].id, feed.id);

        db.unfollow_feed(user.id, feed.id).await.unwrap();
        assert!(db.followed_feeds(user.id).await.unwrap().is_empty());
    }
}
