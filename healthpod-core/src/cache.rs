//! Last-known-good record listings.
//!
//! When the pod cannot be reached, callers show the cached listing instead of
//! an empty one that would look like "no records".
//!
//! ```text
//! <DATA_DIR>/cache/
//!   blood_pressure.json
//!   vaccination.json
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::models::Record;

#[derive(Debug, Clone)]
pub struct RecordCache {
    dir: PathBuf,
}

impl RecordCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: data_dir.into().join("cache"),
        }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Loads the cached listing for `key`.
    ///
    /// Returns `Ok(None)` if nothing has been cached yet.
    pub fn load(&self, key: &str) -> Result<Option<Vec<Record>>, CacheError> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(|e| CacheError::Parse(path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(path, e)),
        }
    }

    pub fn save(&self, key: &str, records: &[Record]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io(self.dir.clone(), e))?;

        let path = self.path(key);
        let json = serde_json::to_string(records).map_err(|e| CacheError::Parse(path.clone(), e))?;
        fs::write(&path, json).map_err(|e| CacheError::Io(path, e))
    }
}

#[derive(Debug)]
pub enum CacheError {
    Io(PathBuf, io::Error),
    Parse(PathBuf, serde_json::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(path, e) => write!(f, "I/O error for {}: {}", path.display(), e),
            CacheError::Parse(path, e) => {
                write!(f, "Invalid cache file {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(_, e) => Some(e),
            CacheError::Parse(_, e) => Some(e),
        }
    }
}
