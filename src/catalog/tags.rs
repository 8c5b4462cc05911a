//! Tag Index mutations.
//!
//! Tags are stored exactly as given: no merging with earlier tags, no
//! deduplication and no case folding.

use serde_json::Value;

use crate::error::CatalogError;
use crate::storage::{Feed, TagIndex};

/// Replaces the tags of `episode_id` and returns the stored list.
///
/// An empty list removes the episode from the index.
pub fn set_tags(
    index: &mut TagIndex,
    episode_id: &str,
    tags: Vec<String>,
) -> Result<Vec<String>, CatalogError> {
    if episode_id.trim().is_empty() {
        return Err(CatalogError::Validation("Episode id is required".into()));
    }
    index.replace(episode_id, tags.clone());
    Ok(tags)
}

/// Cleans labels typed by a user before they are stored: trims, lowercases,
/// drops blanks and keeps the first of any repeats.
///
/// [`set_tags`] never does this itself.
pub fn normalize_labels<I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.trim().to_lowercase();
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

/// Every tag in use, sorted and without duplicates.
pub fn list_tags(index: &TagIndex) -> Vec<String> {
    index.distinct_tags()
}

/// Drops the tag entries of every episode owned by `feed`. Returns how many
/// entries were removed.
pub fn remove_feed_episodes(index: &mut TagIndex, feed: &Feed) -> usize {
    feed.episodes
        .iter()
        .filter(|episode| index.remove(&episode.episode_id))
        .count()
}

/// Reads a tag list from a JSON value, as sent by a client.
///
/// Anything other than an array of strings is a validation error.
pub fn parse_tag_list(value: &Value) -> Result<Vec<String>, CatalogError> {
    let items = value.as_array().ok_or_else(|| {
        CatalogError::Validation("Invalid tags format: tags must be an array".into())
    })?;

    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                CatalogError::Validation(format!("Invalid tags format: {} is not a string", item))
            })
        })
        .collect()
}

/// Body of a tag update request: `{"tags": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUpdate {
    pub tags: Vec<String>,
}

impl TagUpdate {
    pub fn from_json(body: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| CatalogError::Validation(format!("Invalid JSON body: {}", e)))?;
        let tags = value
            .get("tags")
            .ok_or_else(|| CatalogError::Validation("Missing required field: tags".into()))?;
        Ok(Self {
            tags: parse_tag_list(tags)?,
        })
    }
}
