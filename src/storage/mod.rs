//! Storage collaborator for the catalog.
//!
//! The catalog needs exactly two records, the [`FeedCollection`] and the
//! [`TagIndex`], each read and written whole. Backends differ only in where
//! the JSON lands; every one of them replaces a record atomically.

use async_trait::async_trait;

mod json_file;
mod memory;
mod sqlite;
mod types;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{EpisodeRecord, Feed, FeedCollection, StorageError, TagIndex};

/// Full-replace read/write access to the feed collection and the tag index.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_feeds(&self) -> Result<FeedCollection, StorageError>;
    async fn save_feeds(&self, feeds: &FeedCollection) -> Result<(), StorageError>;
    async fn get_tags(&self) -> Result<TagIndex, StorageError>;
    async fn save_tags(&self, tags: &TagIndex) -> Result<(), StorageError>;
}
