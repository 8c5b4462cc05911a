use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::{FeedCollection, StorageError, TagIndex};
use super::Store;

/// Process-local store. Reads hand out copies, so callers can never mutate
/// the stored state except through a save.
#[derive(Default)]
pub struct MemoryStore {
    feeds: RwLock<FeedCollection>,
    tags: RwLock<TagIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with the given records.
    pub fn with_records(feeds: FeedCollection, tags: TagIndex) -> Self {
        Self {
            feeds: RwLock::new(feeds),
            tags: RwLock::new(tags.pruned()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_feeds(&self) -> Result<FeedCollection, StorageError> {
        Ok(self.feeds.read().await.clone())
    }

    async fn save_feeds(&self, feeds: &FeedCollection) -> Result<(), StorageError> {
        *self.feeds.write().await = feeds.clone();
        tracing::debug!(feeds = feeds.feeds.len(), "Feeds updated in memory");
        Ok(())
    }

    async fn get_tags(&self) -> Result<TagIndex, StorageError> {
        Ok(self.tags.read().await.clone())
    }

    async fn save_tags(&self, tags: &TagIndex) -> Result<(), StorageError> {
        *self.tags.write().await = tags.clone().pruned();
        tracing::debug!(episodes = tags.len(), "Tags updated in memory");
        Ok(())
    }
}
