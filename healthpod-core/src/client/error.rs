use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by record operations.
///
/// Per-blob problems (an unreadable or malformed record) never show up here;
/// they are logged and the blob is skipped.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Not logged in. Log in to the pod before saving or deleting records.")]
    NotLoggedIn,
    #[error("Pod unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("{} records match; refusing to pick one: {}", names.len(), names.join(", "))]
    AmbiguousMatch { names: Vec<String> },
    #[error("Failed to write {name}: {source}")]
    Write {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to delete {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RecordError {
    /// Classifies a store failure on a directory-level call.
    pub(crate) fn from_listing(e: StoreError) -> Self {
        match e {
            StoreError::NotLoggedIn => RecordError::NotLoggedIn,
            other => RecordError::StoreUnavailable(other),
        }
    }
}
