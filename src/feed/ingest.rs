//! Feed Ingestor: one fetch, one canonical [`Feed`] aggregate.

use chrono::{DateTime, Utc};

use super::document::{SourceDocument, SourceEntry};
use super::fetcher::{FeedFetcher, FetchError};
use super::ids::{derive_episode_id, derive_feed_id};
use super::normalize::{
    extract_artwork, normalize_duration, resolve_description, resolve_publish_date,
};
use crate::storage::{EpisodeRecord, Feed};

/// Fetches `url` and normalizes it into a [`Feed`].
///
/// Either the whole aggregate comes back or a single [`FetchError`] does;
/// nothing is persisted here.
pub async fn ingest(fetcher: &dyn FeedFetcher, url: &str) -> Result<Feed, FetchError> {
    tracing::debug!(feed = %url, "Ingesting feed");
    let document = fetcher.fetch(url).await?;
    let feed = normalize_document(url, document, Utc::now());
    tracing::info!(feed = %url, episodes = feed.episodes.len(), "Feed ingested");
    Ok(feed)
}

/// Builds the aggregate for an already-parsed document. `now` becomes
/// `lastFetchedAt` and stands in for any missing publish date.
pub fn normalize_document(url: &str, document: SourceDocument, now: DateTime<Utc>) -> Feed {
    let image = extract_artwork(&document.artwork);
    let episodes = document
        .entries
        .into_iter()
        .map(|entry| normalize_entry(url, entry, now))
        .collect();

    Feed {
        id: derive_feed_id(url),
        url: url.to_string(),
        title: document.title.unwrap_or_default(),
        description: document.description.unwrap_or_default(),
        image,
        last_fetched_at: now,
        episodes,
    }
}

fn normalize_entry(url: &str, entry: SourceEntry, now: DateTime<Utc>) -> EpisodeRecord {
    let guid = entry.id.primary_text().map(str::to_string);

    // Derived ids hash the raw date so a re-ingest of a dateless entry keeps its id
    let episode_id = guid.clone().unwrap_or_else(|| {
        derive_episode_id(
            url,
            entry.title.as_deref().unwrap_or(""),
            entry.pub_date.as_deref().unwrap_or(""),
        )
    });

    EpisodeRecord {
        episode_id,
        guid,
        pub_date: resolve_publish_date(entry.pub_date.as_deref(), now),
        description: resolve_description(
            entry.content.as_deref(),
            entry.content_snippet.as_deref(),
            entry.summary.as_deref(),
        ),
        duration: normalize_duration(entry.duration.as_deref()),
        image: extract_artwork(&entry.artwork),
        audio_url: entry.enclosure_url.filter(|u| !u.trim().is_empty()),
        title: entry.title.unwrap_or_default(),
    }
}
