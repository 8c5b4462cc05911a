use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{FeedCollection, StorageError, TagIndex};
use super::Store;

const FEEDS_KEY: &str = "feeds";
const TAGS_KEY: &str = "tags";

/// Keeps the two records as JSON documents in a SQLite table.
///
/// Each save is a single upsert, so a record is always replaced whole.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and run migrations.
    /// `":memory:"` gives a private in-memory database.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        // busy_timeout=5000: wait up to 5s for another writer instead of failing with SQLITE_BUSY
        let options = SqliteConnectOptions::from_str(&url)?.pragma("busy_timeout", "5000");
        // Every in-memory connection is its own database, so stay on one
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store
            .migrate()
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_document<T: DeserializeOwned + Default>(
        &self,
        name: &str,
    ) -> Result<T, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT body FROM documents WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((body,)) => Ok(serde_json::from_str(&body)?),
            None => Ok(T::default()),
        }
    }

    async fn write_document<T: Serialize>(
        &self,
        name: &str,
        record: &T,
    ) -> Result<(), StorageError> {
        let body = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO documents (name, body, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(&body)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(document = name, bytes = body.len(), "Document written");
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_feeds(&self) -> Result<FeedCollection, StorageError> {
        self.read_document(FEEDS_KEY).await
    }

    async fn save_feeds(&self, feeds: &FeedCollection) -> Result<(), StorageError> {
        self.write_document(FEEDS_KEY, feeds).await
    }

    async fn get_tags(&self) -> Result<TagIndex, StorageError> {
        let tags: TagIndex = self.read_document(TAGS_KEY).await?;
        Ok(tags.pruned())
    }

    async fn save_tags(&self, tags: &TagIndex) -> Result<(), StorageError> {
        self.write_document(TAGS_KEY, &tags.clone().pruned()).await
    }
}
