use std::collections::HashMap;
use std::io::Read;

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{info, warn};

use super::CsvError;
use crate::client::{FeatureDir, RecordError, RecordStore};
use crate::models::{timestamp, Feature, FieldSpec, FieldValue, Record};
use crate::store::PodStore;

/// Aggregate result of an import. Individual row problems are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows written to the pod.
    pub saved: usize,
    /// Rows skipped for a blank required field or an unparsable value.
    pub skipped: usize,
    /// Valid rows the pod refused to store.
    pub failed: usize,
    /// Rows whose timestamp repeats an earlier row's.
    pub duplicates: usize,
}

impl ImportSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.saved > 0
    }
}

/// Column positions resolved from the header row.
struct Columns {
    timestamp: usize,
    fields: Vec<(usize, &'static FieldSpec)>,
}

impl Columns {
    /// Resolves header positions, failing if any required column is missing.
    fn resolve(feature: Feature, headers: &StringRecord) -> Result<Self, CsvError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let missing: Vec<String> = feature
            .required_columns()
            .into_iter()
            .filter(|c| position(*c).is_none())
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(CsvError::MissingColumns(missing));
        }

        let timestamp = position(feature.timestamp_column()).unwrap_or_default();
        let fields = feature
            .fields()
            .iter()
            .filter_map(|spec| position(spec.name).map(|i| (i, spec)))
            .collect();

        Ok(Self { timestamp, fields })
    }

    /// Builds a record from one row, or explains why the row is skipped.
    fn to_record(&self, row: &StringRecord) -> Result<Record, String> {
        let cell = |i: usize| row.get(i).map(str::trim).unwrap_or("");

        let raw_ts = cell(self.timestamp);
        let ts = timestamp::parse(raw_ts).map_err(|e| e.to_string())?;

        let mut record = Record::new(ts);
        for (i, spec) in &self.fields {
            let raw = cell(*i);
            if raw.is_empty() {
                if spec.required {
                    return Err(format!("required field '{}' is blank", spec.name));
                }
                continue;
            }
            let value = FieldValue::parse_as(spec.kind, raw)
                .map_err(|e| format!("field '{}': {}", spec.name, e))?;
            record.fields.insert(spec.name.to_string(), value);
        }
        Ok(record)
    }
}

/// Imports CSV rows of `feature` into `dir`, one blob per valid row.
///
/// The header is checked before anything is written. Rows are saved in file
/// order, so when two rows share a timestamp the later one ends up in the
/// blob. Not transactional: rows saved before a failure stay saved.
pub async fn import_csv<S: PodStore, R: Read>(
    client: &RecordStore<S>,
    dir: &FeatureDir,
    feature: Feature,
    reader: R,
) -> Result<ImportSummary, CsvError> {
    let mut summary = ImportSummary::default();
    let records = parse_rows(feature, reader, &mut summary)?;

    for (line, record) in records {
        match client.save_record(dir, &record, None).await {
            Ok(_) => summary.saved += 1,
            Err(RecordError::NotLoggedIn) => return Err(RecordError::NotLoggedIn.into()),
            Err(e) => {
                warn!("Row {}: failed to save: {}", line, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Imported {} {} record(s): {} skipped, {} failed, {} duplicate timestamp(s)",
        summary.saved, feature, summary.skipped, summary.failed, summary.duplicates
    );
    Ok(summary)
}

/// Reads and validates every row. Returns `(line, record)` pairs in file order.
fn parse_rows<R: Read>(
    feature: Feature,
    reader: R,
    summary: &mut ImportSummary,
) -> Result<Vec<(usize, Record)>, CsvError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let columns = Columns::resolve(feature, rdr.headers()?)?;

    let mut records = Vec::new();
    let mut seen: HashMap<NaiveDateTime, usize> = HashMap::new();

    for (i, row) in rdr.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Row {}: unreadable, skipping: {}", line, e);
                summary.skipped += 1;
                continue;
            }
        };
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        match columns.to_record(&row) {
            Ok(record) => {
                if let Some(first) = seen.insert(record.timestamp, line) {
                    warn!(
                        "Row {}: timestamp {} already used by row {}; the later row wins",
                        line,
                        timestamp::format(&record.timestamp),
                        first
                    );
                    summary.duplicates += 1;
                }
                records.push((line, record));
            }
            Err(reason) => {
                warn!("Row {}: skipping, {}", line, reason);
                summary.skipped += 1;
            }
        }
    }

    Ok(records)
}
