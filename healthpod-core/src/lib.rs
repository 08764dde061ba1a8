//! HealthPod Core Library
//!
//! Record models, pod stores and the record store client shared by the
//! HealthPod command-line tool and pod server.

pub mod cache;
pub mod client;
pub mod models;
pub mod store;
pub mod transfer;

pub use cache::{CacheError, RecordCache};
pub use client::{
    DeleteOutcome, FeatureDir, Match, RecordError, RecordStore, Replacement, SaveOutcome,
    BLOB_SUFFIX, DEFAULT_POD_ROOT,
};
pub use models::{
    latest_per_day, sort_newest_first, sort_oldest_first, Feature, FieldKind, FieldSpec,
    FieldValue, Record, TimestampError,
};
pub use store::{DirListing, DirStore, HttpStore, MemoryStore, PodStore, StoreError};
pub use transfer::{export_csv, import_csv, CsvError, ImportSummary};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
