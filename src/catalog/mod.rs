//! The episode catalog: stored feeds plus user tags, merged on every query.
//!
//! [`Catalog`] is the entry point a request layer or the CLI talks to. The
//! pure pieces it is built from ([`list_episodes`], [`set_tags`],
//! [`list_tags`]) are exported for callers that hold the records themselves.

mod aggregate;
mod model;
mod service;
mod tags;

pub use aggregate::{list_episodes, EpisodeFilter};
pub use model::{EpisodeView, FeedSummary, RefreshOutcome};
pub use service::Catalog;
pub use tags::{
    list_tags, normalize_labels, parse_tag_list, remove_feed_episodes, set_tags, TagUpdate,
};
