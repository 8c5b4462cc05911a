//! Catalog Aggregator: flattens stored feeds and the tag index into a
//! filtered, newest-first list of [`EpisodeView`]s.

use std::cmp::Reverse;

use super::model::EpisodeView;
use crate::feed::parse_publish_date;
use crate::storage::{Feed, TagIndex};

/// Optional, AND-combined episode filters. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeFilter {
    /// Exact feed id.
    pub podcast_id: Option<String>,
    /// Case-insensitive substring of episode title, podcast title or description.
    pub query: Option<String>,
    /// Exact member of the episode's tags.
    pub tag: Option<String>,
}

impl EpisodeFilter {
    pub fn podcast(mut self, podcast_id: impl Into<String>) -> Self {
        self.podcast_id = Some(podcast_id.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

fn set(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Lists episodes across `feeds`, newest first.
///
/// Pure read: neither the feeds nor the tag index are touched. Dates that
/// cannot be interpreted sort after every dated episode; ties keep the order
/// in which feeds and their episodes are stored.
pub fn list_episodes(feeds: &[Feed], tags: &TagIndex, filter: &EpisodeFilter) -> Vec<EpisodeView> {
    let podcast_id = set(&filter.podcast_id);
    let query = set(&filter.query).map(str::to_lowercase);
    let tag = set(&filter.tag);

    let mut dated: Vec<_> = feeds
        .iter()
        .filter(|feed| podcast_id.is_none_or(|id| feed.id == id))
        .flat_map(|feed| {
            feed.episodes
                .iter()
                .map(move |episode| {
                    EpisodeView::new(feed, episode, tags.tags_for(&episode.episode_id))
                })
        })
        .filter(|view| query.as_deref().is_none_or(|q| matches_query(view, q)))
        .filter(|view| tag.is_none_or(|t| view.tags.iter().any(|have| have == t)))
        .map(|view| (parse_publish_date(&view.pub_date), view))
        .collect();

    // Reverse(None) sorts after every Reverse(Some(_)); sort_by_key is stable
    dated.sort_by_key(|(date, _)| Reverse(*date));
    dated.into_iter().map(|(_, view)| view).collect()
}

fn matches_query(view: &EpisodeView, needle: &str) -> bool {
    [&view.episode_title, &view.podcast_title, &view.description]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}
