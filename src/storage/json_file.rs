use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;

use super::types::{FeedCollection, StorageError, TagIndex};
use super::Store;

const FEEDS_FILE: &str = "feeds.json";
const TAGS_FILE: &str = "tags.json";

/// Stores the feed collection and tag index as two pretty-printed JSON files.
///
/// Writes go to a uniquely named temporary file in the same directory which
/// is synced and then renamed over the target, so readers see either the
/// old or the new record and never a partial one.
pub struct JsonFileStore {
    dir: PathBuf,
    write_seq: AtomicU64,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_seq: AtomicU64::new(0),
        }
    }

    async fn read_record<T: DeserializeOwned + Default>(
        &self,
        name: &str,
    ) -> Result<T, StorageError> {
        let path = self.dir.join(name);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No stored record yet, starting empty");
                return Ok(T::default());
            }
            Err(e) => return Err(StorageError::io(path, e)),
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_record<T: Serialize>(&self, name: &str, record: &T) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(record)?;
        let target = self.dir.join(name);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;

        // Unique per write: concurrent writers never share a temp file
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let temp = target.with_extension(format!("json.tmp.{:x}.{}", nanos, seq));

        if let Err(e) = write_and_sync(&temp, &json).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(&temp, e));
        }

        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(&target, e));
        }

        tracing::debug!(path = %target.display(), bytes = json.len(), "Record written");
        Ok(())
    }
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get_feeds(&self) -> Result<FeedCollection, StorageError> {
        self.read_record(FEEDS_FILE).await
    }

    async fn save_feeds(&self, feeds: &FeedCollection) -> Result<(), StorageError> {
        self.write_record(FEEDS_FILE, feeds).await
    }

    async fn get_tags(&self) -> Result<TagIndex, StorageError> {
        let tags: TagIndex = self.read_record(TAGS_FILE).await?;
        Ok(tags.pruned())
    }

    async fn save_tags(&self, tags: &TagIndex) -> Result<(), StorageError> {
        self.write_record(TAGS_FILE, &tags.clone().pruned()).await
    }
}
