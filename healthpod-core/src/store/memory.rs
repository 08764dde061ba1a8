//! In-process pod store.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{join_path, path_segments, DirListing, PodStore, StoreError};

/// A pod held in memory.
///
/// Blobs are keyed by their normalized path and listed in name order. The
/// store can be switched into logged-out or unavailable states to exercise
/// client error handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<BTreeMap<String, String>>,
    logged_out: AtomicBool,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_logged_out(&self, logged_out: bool) {
        self.logged_out.store(logged_out, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `write_blob` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stores a blob directly, bypassing auth and write counting.
    pub async fn insert(&self, path: &str, content: impl Into<String>) {
        let key = normalize(path).unwrap_or_else(|_| path.to_string());
        self.blobs.write().await.insert(key, content.into());
    }

    pub async fn contains(&self, path: &str) -> bool {
        match normalize(path) {
            Ok(key) => self.blobs.read().await.contains_key(&key),
            Err(_) => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        if self.logged_out.load(Ordering::SeqCst) {
            return Err(StoreError::NotLoggedIn);
        }
        Ok(())
    }
}

fn normalize(path: &str) -> Result<String, StoreError> {
    Ok(path_segments(path)?.join("/"))
}

#[async_trait]
impl PodStore for MemoryStore {
    async fn ensure_logged_in(&self) -> Result<(), StoreError> {
        if self.logged_out.load(Ordering::SeqCst) {
            return Err(StoreError::NotLoggedIn);
        }
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> Result<DirListing, StoreError> {
        self.check_available()?;
        let dir = normalize(path)?;
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            join_path(&dir, "")
        };

        let blobs = self.blobs.read().await;
        let mut files = Vec::new();
        let mut subdirs = BTreeSet::new();
        for key in blobs.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((subdir, _)) => {
                    subdirs.insert(subdir.to_string());
                }
                None => files.push(rest.to_string()),
            }
        }

        if files.is_empty() && subdirs.is_empty() && !dir.is_empty() {
            return Err(StoreError::NotFound(path.to_string()));
        }

        Ok(DirListing {
            files,
            subdirs: subdirs.into_iter().collect(),
        })
    }

    async fn read_blob(&self, path: &str) -> Result<String, StoreError> {
        self.check_available()?;
        let key = normalize(path)?;
        self.blobs
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write_blob(
        &self,
        path: &str,
        content: &str,
        _encrypted: bool,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let key = normalize(path)?;
        if key.is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        self.blobs.write().await.insert(key, content.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError> {
        self.check_available()?;
        let key = normalize(path)?;
        match self.blobs.write().await.remove(&key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let store = MemoryStore::new();
        store
            .write_blob("pod/data/a.ttl", "hello", true)
            .await
            .unwrap();

        assert_eq!(store.read_blob("pod/data/a.ttl").await.unwrap(), "hello");
        assert_eq!(store.writes(), 1);

        store.delete_blob("pod/data/a.ttl").await.unwrap();
        assert!(store.read_blob("pod/data/a.ttl").await.unwrap_err().is_not_found());
        assert!(store.delete_blob("pod/data/a.ttl").await.is_err());
    }

    #[tokio::test]
    async fn test_list_directory() {
        let store = MemoryStore::new();
        store.insert("pod/data/b.ttl", "").await;
        store.insert("pod/data/a.ttl", "").await;
        store.insert("pod/data/sub/c.ttl", "").await;
        store.insert("pod/other.ttl", "").await;

        let listing = store.list_directory("pod/data/").await.unwrap();
        assert_eq!(listing.files, vec!["a.ttl", "b.ttl"]);
        assert_eq!(listing.subdirs, vec!["sub"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let store = MemoryStore::new();
        let err = store.list_directory("pod/nothing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_offline_states() {
        let store = MemoryStore::new();
        store.insert("pod/a.ttl", "x").await;

        store.set_unavailable(true);
        assert!(matches!(
            store.list_directory("pod").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);

        store.set_logged_out(true);
        assert!(matches!(
            store.ensure_logged_in().await,
            Err(StoreError::NotLoggedIn)
        ));
        assert!(matches!(
            store.write_blob("pod/b.ttl", "y", true).await,
            Err(StoreError::NotLoggedIn)
        ));
        assert_eq!(store.writes(), 0);
    }
}
