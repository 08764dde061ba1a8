//! Blob naming.

use chrono::NaiveDateTime;

use crate::models::{timestamp, Feature};
use crate::store::join_path;

/// Suffix of every blob written by this client. Anything else in a feature
/// directory is ignored.
pub const BLOB_SUFFIX: &str = ".json.enc.ttl";

/// Default pod directory holding the feature directories.
pub const DEFAULT_POD_ROOT: &str = "healthpod/data";

/// Location of one feature's records in the pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDir {
    path: String,
    prefix: String,
}

impl FeatureDir {
    pub fn new(path: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
        }
    }

    /// The directory for `feature` under `root`.
    pub fn for_feature(root: &str, feature: Feature) -> Self {
        Self::new(join_path(root, feature.dir_name()), feature.dir_name())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Blob name for a record with this timestamp. Deterministic.
    pub fn blob_name(&self, ts: &NaiveDateTime) -> String {
        format!("{}_{}{}", self.prefix, timestamp::blob_safe(ts), BLOB_SUFFIX)
    }

    pub fn blob_path(&self, name: &str) -> String {
        join_path(&self.path, name)
    }
}

pub fn is_record_blob(name: &str) -> bool {
    name.ends_with(BLOB_SUFFIX)
}
