use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::{EpisodeRecord, Feed};

/// One episode joined with its podcast and its tags.
///
/// Rebuilt on every query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeView {
    pub episode_id: String,
    pub podcast_id: String,
    pub podcast_title: String,
    pub podcast_image: Option<String>,
    pub episode_title: String,
    pub episode_image: Option<String>,
    pub pub_date: String,
    pub duration: Option<String>,
    pub description: String,
    pub audio_url: Option<String>,
    pub tags: Vec<String>,
}

impl EpisodeView {
    pub(crate) fn new(feed: &Feed, episode: &EpisodeRecord, tags: &[String]) -> Self {
        Self {
            episode_id: episode.episode_id.clone(),
            podcast_id: feed.id.clone(),
            podcast_title: feed.title.clone(),
            podcast_image: feed.image.clone(),
            episode_title: episode.title.clone(),
            episode_image: episode.image.clone(),
            pub_date: episode.pub_date.clone(),
            duration: episode.duration.clone(),
            description: episode.description.clone(),
            audio_url: episode.audio_url.clone(),
            tags: tags.to_vec(),
        }
    }
}

/// A stored feed without its episode list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSummary {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub last_fetched_at: DateTime<Utc>,
    pub episode_count: usize,
}

impl From<&Feed> for FeedSummary {
    fn from(feed: &Feed) -> Self {
        Self {
            id: feed.id.clone(),
            url: feed.url.clone(),
            title: feed.title.clone(),
            description: feed.description.clone(),
            image: feed.image.clone(),
            last_fetched_at: feed.last_fetched_at,
            episode_count: feed.episodes.len(),
        }
    }
}

/// Result of refreshing one feed as part of a batch.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub feed_id: String,
    pub url: String,
    /// Episode count after the refresh, or why it failed.
    pub result: Result<usize, crate::error::CatalogError>,
}
