//! Podcast feed aggregation: ingest RSS/Atom feeds, normalize their episodes
//! and serve a filterable, taggable episode catalog.

pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod storage;
pub mod util;

pub use catalog::Catalog;
pub use error::CatalogError;
