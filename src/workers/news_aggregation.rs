//! News feed aggregation.
//!
//! Each cycle fetches every configured RSS/Atom feed and counts its items.
//! One unreachable feed is logged and skipped; the cycle fails only when
//! every feed fails.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Map, Value};

use crate::error::BoxError;
use crate::workers::interval::Job;

pub const NEWS_AGGREGATION_WORKER: &str = "newsAggregation";

const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct FeedSettings {
    feeds: Vec<String>,
    timeout: Duration,
}

pub struct NewsAggregationJob {
    client: reqwest::Client,
    settings: ArcSwap<FeedSettings>,
    item_counts: DashMap<String, usize>,
}

impl NewsAggregationJob {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            settings: ArcSwap::from_pointee(FeedSettings {
                feeds: Vec::new(),
                timeout: DEFAULT_FEED_TIMEOUT,
            }),
            item_counts: DashMap::new(),
        }
    }

    pub fn feeds(&self) -> Vec<String> {
        self.settings.load().feeds.clone()
    }

    /// Item count seen on the last successful fetch of `feed`.
    pub fn item_count(&self, feed: &str) -> Option<usize> {
        self.item_counts.get(feed).map(|c| *c.value())
    }

    async fn fetch(&self, feed: &str, timeout: Duration) -> Result<usize, BoxError> {
        let body = self
            .client
            .get(feed)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(count_items(&body))
    }
}

impl Default for NewsAggregationJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Job for NewsAggregationJob {
    async fn prepare(&self, settings: &Map<String, Value>) -> Result<(), BoxError> {
        let current = self.settings.load_full();

        let feeds = match settings.get("feeds") {
            None => current.feeds.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| BoxError::from("feeds must be a list of URLs"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err("feeds must be a list of URLs".into()),
        };

        let timeout = match settings.get("timeout_ms") {
            None => current.timeout,
            Some(value) => value
                .as_u64()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .ok_or("timeout_ms must be a positive integer")?,
        };

        self.item_counts.retain(|feed, _| feeds.contains(feed));
        self.settings.store(Arc::new(FeedSettings { feeds, timeout }));
        Ok(())
    }

    async fn run_cycle(&self) -> Result<(), BoxError> {
        let settings = self.settings.load_full();
        if settings.feeds.is_empty() {
            return Ok(());
        }

        let mut failed = 0usize;
        for feed in &settings.feeds {
            match self.fetch(feed, settings.timeout).await {
                Ok(items) => {
                    self.item_counts.insert(feed.clone(), items);
                    tracing::debug!(feed = %feed, items, "Feed fetched");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(feed = %feed, error = %e, "Feed fetch failed");
                }
            }
        }

        if failed == settings.feeds.len() {
            return Err(format!("all {failed} feeds failed").into());
        }
        Ok(())
    }

    fn metrics(&self) -> Map<String, Value> {
        let total: usize = self.item_counts.iter().map(|c| *c.value()).sum();
        let mut metrics = Map::new();
        metrics.insert("feeds".into(), json!(self.settings.load().feeds.len()));
        metrics.insert("reachableFeeds".into(), json!(self.item_counts.len()));
        metrics.insert("items".into(), json!(total));
        metrics
    }
}

/// Count RSS `<item>` and Atom `<entry>` elements.
fn count_items(body: &str) -> usize {
    ["<item>", "<item ", "<entry>", "<entry "]
        .iter()
        .map(|tag| body.matches(tag).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_rss_and_atom_items() {
        let rss = r#"<rss><channel><item><title>a</title></item><item id="2"></item></channel></rss>"#;
        let atom = r#"<feed><entry><title>a</title></entry></feed>"#;
        assert_eq!(count_items(rss), 2);
        assert_eq!(count_items(atom), 1);
        assert_eq!(count_items("<items></items>"), 0);
    }

    #[tokio::test]
    async fn prepare_reads_feeds_and_timeout() {
        let job = NewsAggregationJob::new();
        let mut settings = Map::new();
        settings.insert("feeds".into(), json!(["http://127.0.0.1:9/rss"]));
        settings.insert("timeout_ms".into(), json!(250));
        job.prepare(&settings).await.unwrap();

        assert_eq!(job.feeds(), vec!["http://127.0.0.1:9/rss"]);
        assert_eq!(job.settings.load().timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn malformed_feeds_are_rejected() {
        let job = NewsAggregationJob::new();
        let mut settings = Map::new();
        settings.insert("feeds".into(), json!("http://example.com/rss"));
        assert!(job.prepare(&settings).await.is_err());
    }

    #[tokio::test]
    async fn no_feeds_is_a_quiet_cycle() {
        let job = NewsAggregationJob::new();
        job.run_cycle().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_feeds_fail_the_cycle() {
        let job = NewsAggregationJob::new();
        let mut settings = Map::new();
        settings.insert("feeds".into(), json!(["http://127.0.0.1:9/rss"]));
        settings.insert("timeout_ms".into(), json!(200));
        job.prepare(&settings).await.unwrap();

        assert!(job.run_cycle().await.is_err());
        assert_eq!(job.item_count("http://127.0.0.1:9/rss"), None);
    }
}
