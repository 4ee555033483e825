use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ingest::client::FetchClient;
use crate::ingest::pipeline::Ingestor;
use crate::storage::{Database, StorageError};

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Rejected before the loop starts; a configuration problem, not a runtime one
    #[error("poll interval must be a positive duration")]
    InvalidInterval,
    /// The store was unreachable while claiming the next feed; fatal
    #[error("feed selection failed: {0}")]
    Selection(#[from] StorageError),
}

/// Timer-driven ingestion loop.
///
/// Once per tick the scheduler claims the least-recently-fetched feed (the
/// claim stamps it in the same statement, so concurrent claimants can never
/// pick the same feed) and runs one ingestion cycle inline on the timer task.
/// A slow cycle therefore delays the next tick instead of stacking cycles.
pub struct Scheduler {
    db: Database,
    ingestor: Ingestor,
    interval: Duration,
}

impl Scheduler {
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidInterval` for a zero interval. The
    /// check happens here, before any loop starts.
    pub fn new(
        db: Database,
        client: FetchClient,
        interval: Duration,
    ) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        let ingestor = Ingestor::new(db.clone(), client);
        Ok(Self {
            db,
            ingestor,
            interval,
        })
    }

    /// Block the calling task, polling one feed per tick until `shutdown` is
    /// cancelled or feed selection itself fails.
    ///
    /// Per-cycle failures (network, parse, a single item's persistence) are
    /// logged with the feed and stage and swallowed; the next tick proceeds
    /// with a fresh claim. Cancellation stops the timer and drops any
    /// in-flight cycle, aborting its request; committed inserts stay.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), SchedulerError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "feed scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("feed scheduler stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let feed = match self.db.claim_next_feed().await? {
                Some(feed) => feed,
                None => {
                    tracing::info!("no feeds registered, skipping tick");
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(feed_id = feed.id, "feed scheduler stopped mid-cycle");
                    return Ok(());
                }
                result = self.ingestor.ingest(&feed) => match result {
                    Ok(report) => {
                        tracing::info!(
                            feed_id = feed.id,
                            url = %feed.url,
                            %report,
                            "ingestion cycle finished"
                        );
                    }
                    Err(error) => {
                        tracing::warn!(
                            feed_id = feed.id,
                            url = %feed.url,
                            error = %error,
                            "ingestion cycle failed"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED_BODY: &str = r#"<rss><channel><title>t</title>
        <item><title>post</title><link>https://example.com/p</link></item>
    </channel></rss>"#;

    fn client() -> FetchClient {
        FetchClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_zero_interval_rejected_before_loop() {
        let db = Database::open(":memory:").await.unwrap();
        let result = Scheduler::new(db, client(), Duration::ZERO);
        assert!(matches!(result, Err(SchedulerError::InvalidInterval)));
    }

    #[tokio::test]
    async fn test_empty_store_ticks_are_noops() {
        let db = Database::open(":memory:").await.unwrap();
        let scheduler = Scheduler::new(db, client(), Duration::from_millis(10)).unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.cancel();

        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_loop_rotates_through_all_feeds() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED_BODY))
            .mount(&mock_server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("tester").await.unwrap();
        for name in ["one", "two", "three"] {
            db.add_feed(name, &format!("{}/{}.xml", mock_server.uri(), name), user.id)
                .await
                .unwrap();
        }

        let scheduler =
            Scheduler::new(db.clone(), client(), Duration::from_millis(20)).unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(250)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        // Every feed was visited: each carries a stamp from its claim
        for feed in db.all_feeds().await.unwrap() {
            assert!(
                feed.last_fetched_at.is_some(),
                "feed {} was never polled",
                feed.name
            );
        }
    }

    #[tokio::test]
    async fn test_shutdown_aborts_in_flight_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(FEED_BODY)
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&mock_server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("tester").await.unwrap();
        db.add_feed("slow", &format!("{}/slow.xml", mock_server.uri()), user.id)
            .await
            .unwrap();

        let scheduler = Scheduler::new(db, client(), Duration::from_millis(10)).unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        // Let the loop get stuck inside the stalled fetch, then stop it
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("shutdown must not hang on a stalled network read")
            .unwrap();
        assert!(result.is_ok());
    }
}
