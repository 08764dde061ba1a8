use std::io::Write;

use tracing::info;

use super::CsvError;
use crate::client::{FeatureDir, RecordStore};
use crate::models::{sort_oldest_first, timestamp, Feature};
use crate::store::PodStore;

/// Writes every record of `feature` as CSV, oldest first.
///
/// Returns the number of data rows written. Fails with
/// [`CsvError::NoRecords`] when the directory holds no records.
pub async fn export_csv<S: PodStore, W: Write>(
    client: &RecordStore<S>,
    dir: &FeatureDir,
    feature: Feature,
    writer: W,
) -> Result<usize, CsvError> {
    let mut records = client.list_records(dir).await?;
    if records.is_empty() {
        return Err(CsvError::NoRecords(feature));
    }
    sort_oldest_first(&mut records);

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(feature.columns())?;

    for record in &records {
        let mut row = Vec::with_capacity(feature.fields().len() + 1);
        row.push(timestamp::format(&record.timestamp));
        for spec in feature.fields() {
            row.push(
                record
                    .get(spec.name)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;

    info!("Exported {} {} record(s)", records.len(), feature);
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DEFAULT_POD_ROOT;
    use crate::models::Record;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn setup(feature: Feature) -> (RecordStore<MemoryStore>, FeatureDir) {
        (
            RecordStore::new(MemoryStore::new()),
            FeatureDir::for_feature(DEFAULT_POD_ROOT, feature),
        )
    }

    #[tokio::test]
    async fn test_export_empty_fails() {
        let (client, dir) = setup(Feature::Vaccination);
        let mut out = Vec::new();

        let err = export_csv(&client, &dir, Feature::Vaccination, &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, CsvError::NoRecords(Feature::Vaccination)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_export_sorted_with_header() {
        let (client, dir) = setup(Feature::Vaccination);
        for (day, vaccine) in [(12, "Tetanus"), (3, "Flu"), (7, "Covid")] {
            let ts = NaiveDate::from_ymd_opt(2024, 5, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap();
            let record = Record::new(ts)
                .with_field("vaccine", vaccine)
                .with_field("notes", "left arm, no reaction");
            client.save_record(&dir, &record, None).await.unwrap();
        }

        let mut out = Vec::new();
        let rows = export_csv(&client, &dir, Feature::Vaccination, &mut out)
            .await
            .unwrap();
        assert_eq!(rows, 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "date,vaccine,provider,professional,cost,notes");
        assert_eq!(
            lines[1],
            "2024-05-03T09:00:00.000,Flu,,,,\"left arm, no reaction\""
        );
        assert!(lines[2].contains("Covid"));
        assert!(lines[3].contains("Tetanus"));
    }
}
