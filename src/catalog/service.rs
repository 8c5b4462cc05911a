use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::aggregate::{self, EpisodeFilter};
use super::model::{EpisodeView, FeedSummary, RefreshOutcome};
use super::tags;
use crate::error::CatalogError;
use crate::feed::{self, FeedFetcher};
use crate::storage::{Feed, Store, TagIndex};
use crate::util::{validate_url, HostPolicy};

const DEFAULT_REFRESH_CONCURRENCY: usize = 4;

/// The operations a request layer calls: feed lifecycle, episode listing and
/// tagging over one storage collaborator.
///
/// Every read-modify-write of storage runs under a single writer lock, so
/// concurrent adds, refreshes and deletes cannot drop each other's writes.
/// Network fetches happen before the lock is taken; the state they were based
/// on is re-checked once it is held.
pub struct Catalog {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn FeedFetcher>,
    host_policy: HostPolicy,
    refresh_concurrency: usize,
    write_lock: Mutex<()>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>, fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            store,
            fetcher,
            host_policy: HostPolicy::default(),
            refresh_concurrency: DEFAULT_REFRESH_CONCURRENCY,
            write_lock: Mutex::new(()),
        }
    }

    pub fn host_policy(mut self, policy: HostPolicy) -> Self {
        self.host_policy = policy;
        self
    }

    pub fn refresh_concurrency(mut self, limit: usize) -> Self {
        self.refresh_concurrency = limit.max(1);
        self
    }

    // ------------------------------------------------------------------------
    // Feeds
    // ------------------------------------------------------------------------

    /// Fetches and normalizes `url` without storing anything.
    pub async fn ingest_feed(&self, url: &str) -> Result<Feed, CatalogError> {
        let url = self.checked_url(url)?;
        Ok(feed::ingest(self.fetcher.as_ref(), &url).await?)
    }

    /// Subscribes to `url`.
    ///
    /// Fails with `Conflict` if a feed with exactly this URL is stored, and
    /// with `Fetch` if the source cannot be ingested; in both cases storage
    /// is left untouched.
    pub async fn add_feed(&self, url: &str) -> Result<Feed, CatalogError> {
        let url = self.checked_url(url)?;

        if self.store.get_feeds().await?.find_by_url(&url).is_some() {
            tracing::info!(feed = %url, "Feed already exists");
            return Err(conflict(&url));
        }

        let feed = feed::ingest(self.fetcher.as_ref(), &url).await?;

        let _guard = self.write_lock.lock().await;
        let mut feeds = self.store.get_feeds().await?;
        // Another add may have landed while we were fetching
        if feeds.find_by_url(&url).is_some() {
            return Err(conflict(&url));
        }
        feeds.feeds.push(feed.clone());
        self.store.save_feeds(&feeds).await?;

        tracing::info!(feed = %url, id = %feed.id, episodes = feed.episodes.len(), "Feed added");
        Ok(feed)
    }

    /// Re-ingests a stored feed and replaces it in place, keeping its id.
    pub async fn refresh_feed(&self, feed_id: &str) -> Result<Feed, CatalogError> {
        let url = self
            .store
            .get_feeds()
            .await?
            .find(feed_id)
            .map(|f| f.url.clone())
            .ok_or_else(|| CatalogError::feed_not_found(feed_id))?;

        let mut fresh = feed::ingest(self.fetcher.as_ref(), &url).await?;
        fresh.id = feed_id.to_string();

        let _guard = self.write_lock.lock().await;
        let mut feeds = self.store.get_feeds().await?;
        // Deleted while we were fetching
        let index = feeds
            .position(feed_id)
            .ok_or_else(|| CatalogError::feed_not_found(feed_id))?;
        feeds.feeds[index] = fresh.clone();
        self.store.save_feeds(&feeds).await?;

        tracing::info!(id = %feed_id, episodes = fresh.episodes.len(), "Feed refreshed");
        Ok(fresh)
    }

    /// Refreshes every stored feed, at most `refresh_concurrency` at a time.
    ///
    /// Successful feeds are written back together; a feed that fails keeps
    /// its previous aggregate. Outcomes are returned in stored order.
    pub async fn refresh_all(&self) -> Result<Vec<RefreshOutcome>, CatalogError> {
        let snapshot = self.store.get_feeds().await?;
        if snapshot.feeds.is_empty() {
            return Ok(Vec::new());
        }

        let fetcher = self.fetcher.as_ref();
        let mut fetched: Vec<(usize, String, String, Result<Feed, CatalogError>)> =
            stream::iter(snapshot.feeds.iter().enumerate())
                .map(|(order, stored)| async move {
                    let result = feed::ingest(fetcher, &stored.url)
                        .await
                        .map(|mut fresh| {
                            fresh.id = stored.id.clone();
                            fresh
                        })
                        .map_err(CatalogError::from);
                    (order, stored.id.clone(), stored.url.clone(), result)
                })
                .buffer_unordered(self.refresh_concurrency)
                .collect()
                .await;
        fetched.sort_by_key(|(order, ..)| *order);

        let _guard = self.write_lock.lock().await;
        let mut feeds = self.store.get_feeds().await?;
        let mut changed = false;
        let mut outcomes = Vec::with_capacity(fetched.len());

        for (_, feed_id, url, result) in fetched {
            let result = match result {
                Ok(fresh) => match feeds.position(&feed_id) {
                    Some(index) => {
                        let count = fresh.episodes.len();
                        feeds.feeds[index] = fresh;
                        changed = true;
                        Ok(count)
                    }
                    None => Err(CatalogError::feed_not_found(&feed_id)),
                },
                Err(e) => {
                    tracing::warn!(feed = %url, error = %e, "Feed refresh failed");
                    Err(e)
                }
            };
            outcomes.push(RefreshOutcome {
                feed_id,
                url,
                result,
            });
        }

        if changed {
            self.store.save_feeds(&feeds).await?;
        }

        let refreshed = outcomes.iter().filter(|o| o.result.is_ok()).count();
        tracing::info!(refreshed, failed = outcomes.len() - refreshed, "Refresh complete");
        Ok(outcomes)
    }

    /// Unsubscribes from a feed and drops the tags of all its episodes.
    pub async fn delete_feed(&self, feed_id: &str) -> Result<Feed, CatalogError> {
        let _guard = self.write_lock.lock().await;

        let mut feeds = self.store.get_feeds().await?;
        let index = feeds
            .position(feed_id)
            .ok_or_else(|| CatalogError::feed_not_found(feed_id))?;
        // Both records are read before either is written
        let mut tag_entries = self.store.get_tags().await?;
        let removed = feeds.feeds.remove(index);
        let cleared = tags::remove_feed_episodes(&mut tag_entries, &removed);

        self.store.save_feeds(&feeds).await?;
        if cleared > 0 {
            self.store.save_tags(&tag_entries).await?;
        }

        tracing::info!(id = %feed_id, tag_entries = cleared, "Feed deleted");
        Ok(removed)
    }

    pub async fn list_feeds(&self) -> Result<Vec<FeedSummary>, CatalogError> {
        let feeds = self.store.get_feeds().await?;
        Ok(feeds.feeds.iter().map(FeedSummary::from).collect())
    }

    // ------------------------------------------------------------------------
    // Episodes and tags
    // ------------------------------------------------------------------------

    pub async fn list_episodes(
        &self,
        filter: &EpisodeFilter,
    ) -> Result<Vec<EpisodeView>, CatalogError> {
        let feeds = self.store.get_feeds().await?;
        let index = self.store.get_tags().await?;
        Ok(aggregate::list_episodes(&feeds.feeds, &index, filter))
    }

    /// Replaces an episode's tags; an empty list clears them.
    ///
    /// Tagging an episode no stored feed owns is `NotFound`. Clearing is
    /// always allowed, so entries left behind by a removed episode can go.
    pub async fn set_episode_tags(
        &self,
        episode_id: &str,
        new_tags: Vec<String>,
    ) -> Result<Vec<String>, CatalogError> {
        if episode_id.trim().is_empty() {
            return Err(CatalogError::Validation("Episode id is required".into()));
        }

        let _guard = self.write_lock.lock().await;

        let known = self.store.get_feeds().await?.contains_episode(episode_id);
        if !new_tags.is_empty() && !known {
            return Err(CatalogError::NotFound(format!(
                "Episode not found: {}",
                episode_id
            )));
        }

        let mut index = self.store.get_tags().await?;
        let stored = tags::set_tags(&mut index, episode_id, new_tags)?;
        self.store.save_tags(&index).await?;

        tracing::debug!(episode = %episode_id, tags = stored.len(), "Episode tags updated");
        Ok(stored)
    }

    /// Every tag in use, sorted and unique.
    pub async fn list_tags(&self) -> Result<Vec<String>, CatalogError> {
        Ok(tags::list_tags(&self.store.get_tags().await?))
    }

    pub async fn tag_index(&self) -> Result<TagIndex, CatalogError> {
        Ok(self.store.get_tags().await?)
    }

    fn checked_url(&self, url: &str) -> Result<String, CatalogError> {
        validate_url(url, self.host_policy)?;
        Ok(url.trim().to_string())
    }
}

fn conflict(url: &str) -> CatalogError {
    CatalogError::Conflict(format!("Feed already exists: {}", url))
}
