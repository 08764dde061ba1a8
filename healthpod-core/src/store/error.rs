//! Pod store error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by pod stores.
///
/// These stand in for the failure sentinels of the pod protocol: a call
/// either yields data or one of these.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No credentials, or the pod rejected them.
    #[error("Not logged in to the pod")]
    NotLoggedIn,
    /// The pod could not be reached.
    #[error("Pod unavailable: {0}")]
    Unavailable(String),
    /// No blob or directory at this path.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The pod refused the request.
    #[error("Pod rejected request: {0}")]
    Rejected(String),
    /// Path is empty or tries to escape its root.
    #[error("Invalid pod path: {0}")]
    InvalidPath(String),
    /// Local I/O failure.
    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
