use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failures of a storage backend. The catalog passes these through untouched.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be read back or written as JSON
    #[error("Stored record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// One subscribed source and its episodes.
///
/// `id` is derived from `url` and survives refreshes; `episodes` is replaced
/// wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    pub last_fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub episodes: Vec<EpisodeRecord>,
}

/// An episode as stored inside its feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    pub episode_id: String,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub title: String,
    /// Publish date exactly as the source wrote it
    pub pub_date: String,
    #[serde(default)]
    pub description: String,
    /// Total seconds, as a decimal string
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// The full set of stored feeds, in subscription order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedCollection {
    #[serde(default)]
    pub feeds: Vec<Feed>,
}

impl FeedCollection {
    pub fn find(&self, feed_id: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.id == feed_id)
    }

    pub fn find_by_url(&self, url: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.url == url)
    }

    pub fn position(&self, feed_id: &str) -> Option<usize> {
        self.feeds.iter().position(|f| f.id == feed_id)
    }

    /// Whether any stored feed owns an episode with this id.
    pub fn contains_episode(&self, episode_id: &str) -> bool {
        self.feeds
            .iter()
            .flat_map(|f| f.episodes.iter())
            .any(|e| e.episode_id == episode_id)
    }
}

/// User tags keyed by episode id.
///
/// An episode without tags has no entry at all: [`TagIndex::replace`] with an
/// empty list removes the key, and empty lists found on load are pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagIndex {
    #[serde(rename = "tagsByEpisodeId", default)]
    tags_by_episode_id: BTreeMap<String, Vec<String>>,
}

impl TagIndex {
    /// Tags for an episode, empty when it has none.
    pub fn tags_for(&self, episode_id: &str) -> &[String] {
        self.tags_by_episode_id
            .get(episode_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replaces the tags of an episode. An empty list removes the entry.
    pub fn replace(&mut self, episode_id: &str, tags: Vec<String>) {
        if tags.is_empty() {
            self.tags_by_episode_id.remove(episode_id);
        } else {
            self.tags_by_episode_id.insert(episode_id.to_string(), tags);
        }
    }

    /// Removes an episode's entry, returning whether one existed.
    pub fn remove(&mut self, episode_id: &str) -> bool {
        self.tags_by_episode_id.remove(episode_id).is_some()
    }

    pub fn contains(&self, episode_id: &str) -> bool {
        self.tags_by_episode_id.contains_key(episode_id)
    }

    pub fn len(&self) -> usize {
        self.tags_by_episode_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags_by_episode_id.is_empty()
    }

    /// Every distinct tag in use, sorted.
    pub fn distinct_tags(&self) -> Vec<String> {
        self.tags_by_episode_id
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tags_by_episode_id
            .iter()
            .map(|(id, tags)| (id.as_str(), tags.as_slice()))
    }

    /// Drops entries whose tag list is empty.
    pub(crate) fn pruned(mut self) -> Self {
        self.tags_by_episode_id.retain(|_, tags| !tags.is_empty());
        self
    }
}
