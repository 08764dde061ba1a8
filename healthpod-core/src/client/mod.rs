//! Record store client.
//!
//! Translates between in-memory [`Record`]s and a pod directory holding one
//! blob per record. Every call is awaited in sequence; blobs are read one at a
//! time.
//!
//! ## Updates
//!
//! An update is "locate old, write new, delete old". Writing first means a
//! failure part-way leaves a duplicate rather than losing the record. When the
//! old and new blob share a name the write replaces it in place.

mod error;
pub mod matching;
mod naming;

use tracing::{debug, info, warn};

use crate::models::Record;
use crate::store::{PodStore, StoreError};

pub use error::RecordError;
pub use matching::Match;
pub use naming::{is_record_blob, FeatureDir, BLOB_SUFFIX, DEFAULT_POD_ROOT};

/// What happened to the previous blob during a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// No previous record was given.
    None,
    /// The previous blob (and any stale copies of it) was deleted after the
    /// new one was written.
    Removed(Vec<String>),
    /// The previous blob had the same name and was overwritten.
    Overwritten,
    /// The previous blob could not be located or deleted and may still exist.
    Retained(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Name of the blob written.
    pub name: String,
    pub replacement: Replacement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Every blob holding the record; more than one when stale copies existed.
    Deleted(Vec<String>),
    /// Nothing matched; the record was already gone.
    NotFound,
}

/// Parsed contents of a feature directory.
struct Loaded {
    /// Every record blob name, including ones that failed to parse.
    files: Vec<String>,
    records: Vec<(String, Record)>,
}

/// Record operations against one pod.
#[derive(Debug)]
pub struct RecordStore<S> {
    store: S,
}

impl<S: PodStore> RecordStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lists, reads and parses every record blob in `dir`.
    ///
    /// Blobs that cannot be read or parsed are logged and skipped. A missing
    /// directory is an empty one.
    async fn load(&self, dir: &FeatureDir) -> Result<Loaded, RecordError> {
        let listing = match self.store.list_directory(dir.path()).await {
            Ok(listing) => listing,
            Err(StoreError::NotFound(_)) => {
                debug!("{} does not exist yet", dir.path());
                return Ok(Loaded {
                    files: Vec::new(),
                    records: Vec::new(),
                });
            }
            Err(e) => return Err(RecordError::from_listing(e)),
        };

        let files: Vec<String> = listing
            .files
            .into_iter()
            .filter(|name| is_record_blob(name))
            .collect();

        let mut records = Vec::with_capacity(files.len());
        for name in &files {
            let content = match self.store.read_blob(&dir.blob_path(name)).await {
                Ok(content) => content,
                Err(StoreError::NotLoggedIn) => return Err(RecordError::NotLoggedIn),
                Err(e) => {
                    warn!("Skipping {}: {}", name, e);
                    continue;
                }
            };
            match Record::from_json(&content) {
                Ok(record) => records.push((name.clone(), record)),
                Err(e) => warn!("Skipping malformed record {}: {}", name, e),
            }
        }

        debug!(
            "Loaded {} of {} record(s) from {}",
            records.len(),
            files.len(),
            dir.path()
        );
        Ok(Loaded { files, records })
    }

    /// Lists all records in `dir`, in no particular order.
    pub async fn list_records(&self, dir: &FeatureDir) -> Result<Vec<Record>, RecordError> {
        let loaded = self.load(dir).await?;
        Ok(loaded.records.into_iter().map(|(_, r)| r).collect())
    }

    /// Finds the blob holding `record`.
    pub async fn locate(&self, dir: &FeatureDir, record: &Record) -> Result<Match, RecordError> {
        let loaded = self.load(dir).await?;
        let expected = dir.blob_name(&record.timestamp);
        Ok(matching::locate(
            record,
            &loaded.records,
            &loaded.files,
            &expected,
        ))
    }

    /// Saves `record`, replacing `previous` when it is given.
    ///
    /// Failing to find or remove the previous blob does not stop the save;
    /// it is logged and reported as [`Replacement::Retained`].
    pub async fn save_record(
        &self,
        dir: &FeatureDir,
        record: &Record,
        previous: Option<&Record>,
    ) -> Result<SaveOutcome, RecordError> {
        self.ensure_logged_in().await?;

        let old = match previous {
            Some(prev) => Some(self.locate(dir, prev).await),
            None => None,
        };

        let content = record.to_json()?;
        let name = dir.blob_name(&record.timestamp);
        self.store
            .write_blob(&dir.blob_path(&name), &content, true)
            .await
            .map_err(|source| match source {
                StoreError::NotLoggedIn => RecordError::NotLoggedIn,
                source => RecordError::Write {
                    name: name.clone(),
                    source,
                },
            })?;

        let replacement = match old {
            None => Replacement::None,
            Some(Ok(Match::Found(old_name))) => self.replace(dir, &name, vec![old_name]).await,
            Some(Ok(Match::Copies(names))) => self.replace(dir, &name, names).await,
            Some(Ok(Match::NotFound)) => {
                warn!("Saved {}; previous record not found in {}", name, dir.path());
                Replacement::Retained("previous record not found".into())
            }
            Some(Ok(Match::Ambiguous(names))) => {
                warn!(
                    "Saved {}; previous record matches {} blobs, left in place: {}",
                    name,
                    names.len(),
                    names.join(", ")
                );
                Replacement::Retained(format!("{} blobs match previous record", names.len()))
            }
            Some(Err(e)) => {
                warn!("Saved {}; could not look up previous record: {}", name, e);
                Replacement::Retained(e.to_string())
            }
        };

        Ok(SaveOutcome { name, replacement })
    }

    /// Deletes the blob holding `record`, along with any stale copies that
    /// carry the same id.
    ///
    /// Deleting a record that is not there succeeds with
    /// [`DeleteOutcome::NotFound`]. More than one legacy blob matching on
    /// content is an error and nothing is deleted.
    pub async fn delete_record(
        &self,
        dir: &FeatureDir,
        record: &Record,
    ) -> Result<DeleteOutcome, RecordError> {
        self.ensure_logged_in().await?;

        let names = match self.locate(dir, record).await? {
            Match::Found(name) => vec![name],
            Match::Copies(names) => {
                info!("{} copies of {} found; deleting all", names.len(), record);
                names
            }
            Match::NotFound => {
                info!("No record to delete in {} ({})", dir.path(), record);
                return Ok(DeleteOutcome::NotFound);
            }
            Match::Ambiguous(names) => return Err(RecordError::AmbiguousMatch { names }),
        };

        let mut deleted = Vec::with_capacity(names.len());
        for name in names {
            match self.store.delete_blob(&dir.blob_path(&name)).await {
                Ok(()) => {
                    info!("Deleted {}", name);
                    deleted.push(name);
                }
                Err(StoreError::NotFound(_)) => {
                    info!("{} vanished before it could be deleted", name);
                }
                Err(StoreError::NotLoggedIn) => return Err(RecordError::NotLoggedIn),
                Err(source) => return Err(RecordError::Delete { name, source }),
            }
        }

        if deleted.is_empty() {
            Ok(DeleteOutcome::NotFound)
        } else {
            Ok(DeleteOutcome::Deleted(deleted))
        }
    }

    /// Deletes the blobs of the previous version after `written` was saved.
    /// A blob named `written` was overwritten by the save and is kept.
    async fn replace(&self, dir: &FeatureDir, written: &str, old: Vec<String>) -> Replacement {
        let stale: Vec<String> = old.into_iter().filter(|n| n != written).collect();
        if stale.is_empty() {
            return Replacement::Overwritten;
        }

        let mut removed = Vec::with_capacity(stale.len());
        let mut failed = Vec::new();
        for old_name in stale {
            match self.store.delete_blob(&dir.blob_path(&old_name)).await {
                Ok(()) | Err(StoreError::NotFound(_)) => removed.push(old_name),
                Err(e) => {
                    warn!("Saved {} but could not delete {}: {}", written, old_name, e);
                    failed.push(format!("{}: {}", old_name, e));
                }
            }
        }

        if failed.is_empty() {
            Replacement::Removed(removed)
        } else {
            Replacement::Retained(format!("delete failed for {}", failed.join("; ")))
        }
    }

    async fn ensure_logged_in(&self) -> Result<(), RecordError> {
        self.store
            .ensure_logged_in()
            .await
            .map_err(RecordError::from_listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feature;
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn reading(ts: NaiveDateTime, systolic: i64) -> Record {
        Record::new(ts)
            .with_field("systolic", systolic)
            .with_field("diastolic", 80)
            .with_field("heart_rate", 64)
    }

    fn setup() -> (RecordStore<MemoryStore>, FeatureDir) {
        let client = RecordStore::new(MemoryStore::new());
        let dir = FeatureDir::for_feature(DEFAULT_POD_ROOT, Feature::BloodPressure);
        (client, dir)
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let (client, dir) = setup();
        let record = reading(at(1, 9, 0), 120);

        let outcome = client.save_record(&dir, &record, None).await.unwrap();
        assert_eq!(outcome.name, dir.blob_name(&record.timestamp));
        assert_eq!(outcome.replacement, Replacement::None);

        let records = client.list_records(&dir).await.unwrap();
        assert_eq!(records, vec![record]);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let (client, dir) = setup();
        assert!(client.list_records(&dir).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_and_foreign_blobs() {
        let (client, dir) = setup();
        for (i, day) in [1, 2, 3].into_iter().enumerate() {
            client
                .save_record(&dir, &reading(at(day, 9, 0), 110 + i as i64), None)
                .await
                .unwrap();
        }
        client
            .store()
            .insert(&dir.blob_path("blood_pressure_broken.json.enc.ttl"), "{not json")
            .await;
        client
            .store()
            .insert(&dir.blob_path("notes.txt"), "{not json either")
            .await;

        let records = client.list_records(&dir).await.unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_list_unavailable() {
        let (client, dir) = setup();
        client.store().set_unavailable(true);
        assert!(matches!(
            client.list_records(&dir).await,
            Err(RecordError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_save_not_logged_in_writes_nothing() {
        let (client, dir) = setup();
        client.store().set_logged_out(true);

        let result = client
            .save_record(&dir, &reading(at(1, 9, 0), 120), None)
            .await;
        assert!(matches!(result, Err(RecordError::NotLoggedIn)));
        assert_eq!(client.store().writes(), 0);
    }

    #[tokio::test]
    async fn test_update_replaces_previous() {
        let (client, dir) = setup();
        let original = reading(at(1, 9, 0), 120);
        client.save_record(&dir, &original, None).await.unwrap();

        let mut edited = original.clone();
        edited.timestamp = at(1, 10, 15);
        edited.fields.insert("systolic".into(), 135.into());

        let outcome = client
            .save_record(&dir, &edited, Some(&original))
            .await
            .unwrap();
        assert_eq!(
            outcome.replacement,
            Replacement::Removed(vec![dir.blob_name(&original.timestamp)])
        );

        let records = client.list_records(&dir).await.unwrap();
        assert_eq!(records, vec![edited]);
    }

    #[tokio::test]
    async fn test_update_same_timestamp_overwrites() {
        let (client, dir) = setup();
        let original = Record::legacy(at(1, 9, 0)).with_field("systolic", 120);
        client.save_record(&dir, &original, None).await.unwrap();

        let edited = original.clone().with_field("systolic", 125);
        let outcome = client
            .save_record(&dir, &edited, Some(&original))
            .await
            .unwrap();
        assert_eq!(outcome.replacement, Replacement::Overwritten);
        assert_eq!(client.list_records(&dir).await.unwrap(), vec![edited]);
    }

    #[tokio::test]
    async fn test_update_legacy_record_by_fields() {
        let (client, dir) = setup();
        let original = Record::legacy(at(1, 9, 0))
            .with_field("systolic", 120)
            .with_field("diastolic", 80);
        client.save_record(&dir, &original, None).await.unwrap();

        let mut edited = original.clone();
        edited.timestamp = at(4, 7, 0);
        edited.fields.insert("diastolic".into(), 85.into());

        let outcome = client
            .save_record(&dir, &edited, Some(&original))
            .await
            .unwrap();
        assert!(matches!(outcome.replacement, Replacement::Removed(_)));

        let records = client.list_records(&dir).await.unwrap();
        assert_eq!(records, vec![edited]);
    }

    #[tokio::test]
    async fn test_update_missing_previous_still_saves() {
        let (client, dir) = setup();
        let ghost = reading(at(1, 9, 0), 120);
        let record = reading(at(2, 9, 0), 118);

        let outcome = client
            .save_record(&dir, &record, Some(&ghost))
            .await
            .unwrap();
        assert!(matches!(outcome.replacement, Replacement::Retained(_)));
        assert_eq!(client.list_records(&dir).await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_delete_record() {
        let (client, dir) = setup();
        let keep = reading(at(1, 9, 0), 120);
        let drop = reading(at(2, 9, 0), 140);
        client.save_record(&dir, &keep, None).await.unwrap();
        client.save_record(&dir, &drop, None).await.unwrap();

        let outcome = client.delete_record(&dir, &drop).await.unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted(vec![dir.blob_name(&drop.timestamp)])
        );
        let dropped = dir.blob_path(&dir.blob_name(&drop.timestamp));
        assert!(!client.store().contains(&dropped).await);
        assert_eq!(client.list_records(&dir).await.unwrap(), vec![keep]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let (client, dir) = setup();
        client
            .save_record(&dir, &reading(at(1, 9, 0), 120), None)
            .await
            .unwrap();

        let outcome = client
            .delete_record(&dir, &reading(at(9, 9, 0), 99))
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert_eq!(client.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_ambiguous_is_error() {
        let (client, dir) = setup();
        let morning = Record::legacy(at(1, 8, 0)).with_field("systolic", 120);
        let evening = Record::legacy(at(1, 20, 0)).with_field("systolic", 120);
        client.save_record(&dir, &morning, None).await.unwrap();
        client.save_record(&dir, &evening, None).await.unwrap();

        let target = Record::legacy(at(1, 12, 0)).with_field("systolic", 120);
        let err = client.delete_record(&dir, &target).await.unwrap_err();
        assert!(matches!(err, RecordError::AmbiguousMatch { ref names } if names.len() == 2));
        assert_eq!(client.store().len().await, 2);
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_blob_name() {
        let (client, dir) = setup();
        let stored = Record::legacy(at(1, 9, 0)).with_field("systolic", 120);
        client.save_record(&dir, &stored, None).await.unwrap();

        let stale_copy = Record::legacy(at(1, 9, 0)).with_field("systolic", 121);
        let outcome = client.delete_record(&dir, &stale_copy).await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
        assert!(client.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_not_logged_in() {
        let (client, dir) = setup();
        let record = reading(at(1, 9, 0), 120);
        client.save_record(&dir, &record, None).await.unwrap();

        client.store().set_logged_out(true);
        assert!(matches!(
            client.delete_record(&dir, &record).await,
            Err(RecordError::NotLoggedIn)
        ));
    }

    /// Leaves `record` in the pod next to an edited copy with the same id, as
    /// an update whose final delete failed would.
    async fn with_stale_copy(
        client: &RecordStore<MemoryStore>,
        dir: &FeatureDir,
        record: &Record,
    ) -> Record {
        client.save_record(dir, record, None).await.unwrap();
        let mut edited = record.clone();
        edited.timestamp = at(1, 10, 0);
        edited.fields.insert("systolic".into(), 131.into());
        client
            .store()
            .insert(
                &dir.blob_path(&dir.blob_name(&edited.timestamp)),
                edited.to_json().unwrap(),
            )
            .await;
        edited
    }

    #[tokio::test]
    async fn test_delete_removes_stale_copies() {
        let (client, dir) = setup();
        let original = reading(at(1, 9, 0), 120);
        let edited = with_stale_copy(&client, &dir, &original).await;
        let other = reading(at(2, 9, 0), 118);
        client.save_record(&dir, &other, None).await.unwrap();

        let outcome = client.delete_record(&dir, &edited).await.unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted(vec![
                dir.blob_name(&original.timestamp),
                dir.blob_name(&edited.timestamp),
            ])
        );
        assert_eq!(client.list_records(&dir).await.unwrap(), vec![other]);
    }

    #[tokio::test]
    async fn test_update_removes_stale_copies() {
        let (client, dir) = setup();
        let original = reading(at(1, 9, 0), 120);
        let edited = with_stale_copy(&client, &dir, &original).await;

        let mut again = edited.clone();
        again.timestamp = at(1, 11, 30);
        let outcome = client
            .save_record(&dir, &again, Some(&edited))
            .await
            .unwrap();
        assert_eq!(
            outcome.replacement,
            Replacement::Removed(vec![
                dir.blob_name(&original.timestamp),
                dir.blob_name(&edited.timestamp),
            ])
        );
        assert_eq!(client.list_records(&dir).await.unwrap(), vec![again]);
    }

    #[tokio::test]
    async fn test_update_onto_a_copy_keeps_the_new_blob() {
        let (client, dir) = setup();
        let original = reading(at(1, 9, 0), 120);
        let edited = with_stale_copy(&client, &dir, &original).await;

        let mut again = edited.clone();
        again.fields.insert("systolic".into(), 133.into());
        let outcome = client
            .save_record(&dir, &again, Some(&edited))
            .await
            .unwrap();
        assert_eq!(
            outcome.replacement,
            Replacement::Removed(vec![dir.blob_name(&original.timestamp)])
        );
        assert_eq!(client.list_records(&dir).await.unwrap(), vec![again]);
    }

    #[tokio::test]
    async fn test_delete_superseded_record_keeps_newer_one() {
        let (client, dir) = setup();
        let first = reading(at(1, 9, 0), 120);
        let second = reading(at(1, 9, 0), 126);
        client.save_record(&dir, &first, None).await.unwrap();
        client.save_record(&dir, &second, None).await.unwrap();

        let outcome = client.delete_record(&dir, &first).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
        let kept = dir.blob_path(&dir.blob_name(&second.timestamp));
        assert!(client.store().contains(&kept).await);
        assert_eq!(client.list_records(&dir).await.unwrap(), vec![second]);
    }
}
