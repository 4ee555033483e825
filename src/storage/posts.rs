use super::schema::Database;
use super::types::{NewPost, Post, StorageError};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post, deduplicating on URL.
    ///
    /// Returns `true` when a row was actually inserted and `false` when a post
    /// with this URL already exists. The uniqueness constraint is the only
    /// concurrency control here: of two simultaneous inserts for one URL, one
    /// wins and the other observes "already exists"; both are success.
    pub async fn insert_post(&self, post: &NewPost) -> Result<bool, StorageError> {
        let now = Self::now();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All posts for one feed, newest first
    pub async fn posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, StorageError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC, created_at DESC, id DESC
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Recent posts from the feeds a user follows (the `browse` command)
    pub async fn recent_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Post>, StorageError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.feed_id, p.title, p.url, p.description, p.published_at, p.created_at
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.created_at DESC, p.id DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }
}
