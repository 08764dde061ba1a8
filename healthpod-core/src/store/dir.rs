//! Pod store backed by a local directory.
//!
//! Layout mirrors the pod paths one-to-one:
//! ```text
//! <ROOT>/
//!   healthpod/data/
//!     blood_pressure/
//!       blood_pressure_2024-05-01T10-30-00-000.json.enc.ttl
//!     vaccination/
//!       ...
//! ```

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{path_segments, DirListing, PodStore, StoreError};

/// Local directory pod. Used for offline mode and by the pod server.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a pod path under the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let mut resolved = self.root.clone();
        for segment in path_segments(path)? {
            resolved.push(segment);
        }
        Ok(resolved)
    }

    fn resolve_blob(&self, path: &str) -> Result<PathBuf, StoreError> {
        let resolved = self.resolve(path)?;
        if resolved == self.root {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

fn io_error(path: &str, local: PathBuf, e: io::Error) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(path.to_string())
    } else {
        StoreError::Io {
            path: local,
            source: e,
        }
    }
}

#[async_trait]
impl PodStore for DirStore {
    async fn ensure_logged_in(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> Result<DirListing, StoreError> {
        let dir = self.resolve(path)?;
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| io_error(path, dir.clone(), e))?;

        let mut listing = DirListing::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(path, dir.clone(), e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| io_error(path, entry.path(), e))?;
            if file_type.is_dir() {
                listing.subdirs.push(name);
            } else {
                listing.files.push(name);
            }
        }

        listing.files.sort();
        listing.subdirs.sort();
        Ok(listing)
    }

    async fn read_blob(&self, path: &str) -> Result<String, StoreError> {
        let file = self.resolve_blob(path)?;
        fs::read_to_string(&file)
            .await
            .map_err(|e| io_error(path, file, e))
    }

    /// Writes via a hidden temp file and a rename so readers never see a
    /// partial blob.
    async fn write_blob(
        &self,
        path: &str,
        content: &str,
        _encrypted: bool,
    ) -> Result<(), StoreError> {
        let file = self.resolve_blob(path)?;
        let parent = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent)
            .await
            .map_err(|e| io_error(path, parent.clone(), e))?;

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(".{}.tmp", file_name));

        fs::write(&temp, content)
            .await
            .map_err(|e| io_error(path, temp.clone(), e))?;
        fs::rename(&temp, &file)
            .await
            .map_err(|e| io_error(path, file, e))?;
        Ok(())
    }

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError> {
        let file = self.resolve_blob(path)?;
        fs::remove_file(&file)
            .await
            .map_err(|e| io_error(path, file, e))
    }
}
