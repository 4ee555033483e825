use chrono::DateTime;
use thiserror::Error;

use crate::ingest::client::{FetchClient, FetchError};
use crate::ingest::parser::{self, ParseError, RawItem};
use crate::storage::{Database, Feed, NewPost, StorageError};

/// A cycle-level failure: the feed never produced items to process.
/// Per-item persistence failures are not cycle-level; they are reported
/// individually in the [`IngestReport`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Stamping the feed after a successful fetch failed
    #[error("could not record fetch for feed: {0}")]
    Stamp(#[source] StorageError),
}

/// Outcome of one ingestion cycle over a single feed.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub feed_id: i64,
    /// Items persisted for the first time
    pub new_posts: usize,
    /// Items whose URL was already in the store (success, not an error)
    pub duplicates: usize,
    /// Items with no link: nothing to deduplicate on, so nothing is stored
    pub skipped: usize,
    /// Per-item persistence failures; the remaining items were still processed
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug)]
pub struct ItemFailure {
    pub title: String,
    pub url: String,
    pub error: StorageError,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} new, {} duplicate, {} skipped, {} failed",
            self.new_posts,
            self.duplicates,
            self.skipped,
            self.failures.len()
        )
    }
}

/// Drives one feed through fetch → stamp → parse → per-item persist.
///
/// Idempotence and partial-failure policy live here: re-ingesting unchanged
/// upstream content produces zero additional post rows, and a single item's
/// failure never takes down the rest of the cycle.
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    client: FetchClient,
}

impl Ingestor {
    pub fn new(db: Database, client: FetchClient) -> Self {
        Self { db, client }
    }

    /// Run one full poll-to-persist cycle for `feed`.
    ///
    /// On a fetch error nothing is touched; the feed is retried whenever the
    /// rotation next reaches it. On fetch success the feed is stamped before
    /// any item is processed, so per-item outcomes cannot unwind the fetch
    /// record. A parse error after that leaves the stamp standing.
    pub async fn ingest(&self, feed: &Feed) -> Result<IngestReport, IngestError> {
        let bytes = self.client.fetch(&feed.url).await?;

        self.db
            .mark_feed_fetched(feed.id)
            .await
            .map_err(IngestError::Stamp)?;

        let raw = parser::parse(&bytes)?;
        tracing::debug!(
            feed_id = feed.id,
            url = %feed.url,
            channel = %raw.title,
            items = raw.items.len(),
            "feed parsed"
        );

        let mut report = IngestReport {
            feed_id: feed.id,
            ..IngestReport::default()
        };

        // Items are processed and inserted in source order.
        for item in &raw.items {
            if item.link.is_empty() {
                tracing::debug!(
                    feed_id = feed.id,
                    title = %item.title,
                    "item has no link, skipping"
                );
                report.skipped += 1;
                continue;
            }

            let post = normalize_item(feed.id, item);
            match self.db.insert_post(&post).await {
                Ok(true) => report.new_posts += 1,
                Ok(false) => report.duplicates += 1,
                Err(error) => {
                    tracing::error!(
                        feed_id = feed.id,
                        url = %post.url,
                        error = %error,
                        "failed to persist item"
                    );
                    report.failures.push(ItemFailure {
                        title: post.title,
                        url: post.url,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }
}

/// Turn a raw item into a post ready for insertion.
///
/// The post's canonical URL is the item's link. An empty description becomes
/// absent rather than an empty string; a missing or unparsable `pubDate`
/// yields an absent `published_at`, never a failed item.
fn normalize_item(feed_id: i64, item: &RawItem) -> NewPost {
    let description = if item.description.is_empty() {
        None
    } else {
        Some(item.description.clone())
    };

    let published_at = if item.pub_date.is_empty() {
        None
    } else {
        match DateTime::parse_from_rfc2822(&item.pub_date) {
            Ok(date) => Some(date.timestamp()),
            Err(error) => {
                tracing::debug!(
                    feed_id = feed_id,
                    pub_date = %item.pub_date,
                    error = %error,
                    "unparsable pubDate, storing post without one"
                );
                None
            }
        }
    };

    NewPost {
        feed_id,
        title: item.title.clone(),
        url: item.link.clone(),
        description,
        published_at,
    }
}
