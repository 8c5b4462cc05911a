//! Feed ingestion: from a URL to a normalized [`Feed`](crate::storage::Feed).
//!
//! The pipeline is split leaf-first:
//!
//! - [`ids`] derives stable feed and episode identifiers
//! - [`normalize`] resolves artwork, duration, date and description fields
//! - [`document`] parses RSS/Atom/JSON Feed bytes into a [`SourceDocument`]
//! - [`fetcher`] retrieves documents over HTTP with a bounded timeout
//! - [`ingest`](mod@ingest) ties them together
//!
//! # Example
//!
//! ```
//! use podshelf::feed::{derive_feed_id, normalize_duration};
//!
//! let id = derive_feed_id("https://example.com/rss");
//! assert!(id.starts_with("feed_"));
//! assert_eq!(normalize_duration(Some("1:02:03")).as_deref(), Some("3723"));
//! ```

pub mod document;
pub mod fetcher;
pub mod ids;
pub mod ingest;
pub mod normalize;

pub use document::{parse_document, EntryId, ParseError, SourceDocument, SourceEntry};
pub use fetcher::{FeedFetcher, FetchError, HttpFetcher};
pub use ids::{derive_episode_id, derive_feed_id};
pub use ingest::{ingest, normalize_document};
pub use normalize::{
    duration_seconds, extract_artwork, format_duration_long, format_duration_short,
    normalize_duration, parse_publish_date, resolve_description, resolve_publish_date, Artwork,
    ArtworkField,
};
