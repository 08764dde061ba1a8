//! Pod stores.
//!
//! A pod is a tree of directories holding named blobs. Every store speaks the
//! same four-call protocol:
//!
//! 1. `list_directory(path)` returns the file and subdirectory names
//! 2. `read_blob(path)` returns the (already decrypted) blob content
//! 3. `write_blob(path, content, encrypted)` creates or replaces a blob
//! 4. `delete_blob(path)` removes a blob
//!
//! Paths are `/`-separated and relative to the pod root.

mod dir;
mod error;
mod http;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use dir::DirStore;
pub use error::StoreError;
pub use http::HttpStore;
pub use memory::MemoryStore;

/// Contents of one pod directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirListing {
    pub files: Vec<String>,
    pub subdirs: Vec<String>,
}

/// The remote directory protocol.
#[async_trait]
pub trait PodStore: Send + Sync {
    /// Fails with `StoreError::NotLoggedIn` when mutating calls would be rejected.
    async fn ensure_logged_in(&self) -> Result<(), StoreError>;

    async fn list_directory(&self, path: &str) -> Result<DirListing, StoreError>;

    async fn read_blob(&self, path: &str) -> Result<String, StoreError>;

    async fn write_blob(&self, path: &str, content: &str, encrypted: bool)
        -> Result<(), StoreError>;

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: PodStore + ?Sized> PodStore for Box<T> {
    async fn ensure_logged_in(&self) -> Result<(), StoreError> {
        (**self).ensure_logged_in().await
    }

    async fn list_directory(&self, path: &str) -> Result<DirListing, StoreError> {
        (**self).list_directory(path).await
    }

    async fn read_blob(&self, path: &str) -> Result<String, StoreError> {
        (**self).read_blob(path).await
    }

    async fn write_blob(
        &self,
        path: &str,
        content: &str,
        encrypted: bool,
    ) -> Result<(), StoreError> {
        (**self).write_blob(path, content, encrypted).await
    }

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError> {
        (**self).delete_blob(path).await
    }
}

/// Joins a directory path and a name with exactly one `/` between them.
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Splits a pod path into its non-empty segments, rejecting traversal.
pub fn path_segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment.starts_with('.') || segment.contains('\\') {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        segments.push(segment);
    }
    Ok(segments)
}
