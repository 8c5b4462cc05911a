use thiserror::Error;

use crate::feed::FetchError;
use crate::storage::StorageError;
use crate::util::UrlValidationError;

/// Everything a catalog operation can fail with.
///
/// Each variant maps to a stable, machine-readable [`kind`](CatalogError::kind)
/// so a request layer can pick a status without matching on messages.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The source was unreachable, timed out or could not be parsed.
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),

    /// Caller input broke a contract; nothing was mutated.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CatalogError {
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Fetch(_) => "fetch_error",
            CatalogError::Validation(_) => "validation_error",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::Conflict(_) => "conflict",
            CatalogError::Storage(_) => "storage_error",
        }
    }

    pub(crate) fn feed_not_found(feed_id: &str) -> Self {
        CatalogError::NotFound(format!("Feed not found: {}", feed_id))
    }
}

impl From<UrlValidationError> for CatalogError {
    fn from(e: UrlValidationError) -> Self {
        CatalogError::Validation(e.to_string())
    }
}
