//! Locating the blob that holds a given record.
//!
//! Blobs carry no server-assigned key. A record written by this client has a
//! client-generated id and is found by it; older records are found by their
//! field values plus the calendar date of their timestamp.

use crate::models::Record;

/// Result of looking a record up among the loaded blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    Found(String),
    /// Several blobs carry the target's id. They are copies of one record,
    /// left behind when an update could not remove the old blob.
    Copies(Vec<String>),
    NotFound,
    /// Several legacy blobs match on content; none can be preferred.
    Ambiguous(Vec<String>),
}

/// True when `candidate` is the stored form of `target`.
///
/// With ids on both sides only the ids are compared. Otherwise every field
/// must be equal and the timestamps must fall on the same calendar day; the
/// time of day is ignored.
pub fn same_record(candidate: &Record, target: &Record) -> bool {
    match (candidate.id, target.id) {
        (Some(a), Some(b)) => a == b,
        _ => candidate.fields == target.fields && candidate.date() == target.date(),
    }
}

/// True when both records carry ids and they differ.
fn different_ids(candidate: &Record, target: &Record) -> bool {
    matches!((candidate.id, target.id), (Some(a), Some(b)) if a != b)
}

/// Finds the blob holding `target`.
///
/// `candidates` are the parsed blobs in listing order, `files` every record
/// blob name in the directory (parsed or not). Id matches win over content
/// matches. When nothing matches, a blob named exactly `expected_name` is
/// taken as the match unless it parsed and belongs to another record.
pub fn locate(
    target: &Record,
    candidates: &[(String, Record)],
    files: &[String],
    expected_name: &str,
) -> Match {
    let by_id: Vec<String> = candidates
        .iter()
        .filter(|(_, c)| target.id.is_some() && c.id == target.id)
        .map(|(name, _)| name.clone())
        .collect();
    if by_id.len() > 1 {
        return Match::Copies(by_id);
    }

    let mut matches = if by_id.is_empty() {
        candidates
            .iter()
            .filter(|(_, candidate)| same_record(candidate, target))
            .map(|(name, _)| name.clone())
            .collect()
    } else {
        by_id
    };

    match matches.len() {
        0 => {
            let taken = candidates
                .iter()
                .any(|(name, c)| name == expected_name && different_ids(c, target));
            if !taken && files.iter().any(|f| f == expected_name) {
                Match::Found(expected_name.to_string())
            } else {
                Match::NotFound
            }
        }
        1 => Match::Found(matches.remove(0)),
        _ => Match::Ambiguous(matches),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn legacy(ts: NaiveDateTime, vaccine: &str) -> Record {
        Record::legacy(ts)
            .with_field("vaccine", vaccine)
            .with_field("provider", "Clinic")
    }

    #[test]
    fn test_same_day_different_time_matches() {
        let stored = legacy(at(1, 9, 0), "Flu");
        let target = legacy(at(1, 9, 1), "Flu");
        assert!(same_record(&stored, &target));

        let late = legacy(at(1, 23, 59), "Flu");
        assert!(same_record(&stored, &late));
    }

    #[test]
    fn test_different_day_does_not_match() {
        let stored = legacy(at(1, 23, 59), "Flu");
        let target = legacy(at(2, 0, 0), "Flu");
        assert!(!same_record(&stored, &target));
    }

    #[test]
    fn test_field_difference_does_not_match() {
        let stored = legacy(at(1, 9, 0), "Flu");
        let target = legacy(at(1, 9, 0), "Tetanus");
        assert!(!same_record(&stored, &target));

        let extra = legacy(at(1, 9, 0), "Flu").with_field("notes", "arm sore");
        assert!(!same_record(&stored, &extra));
    }

    #[test]
    fn test_ids_take_precedence() {
        let stored = Record::new(at(1, 9, 0)).with_field("vaccine", "Flu");
        let mut edited = stored.clone();
        edited.fields.insert("vaccine".into(), "Tetanus".into());
        edited.timestamp = at(3, 9, 0);
        assert!(same_record(&stored, &edited));

        let twin = Record::new(at(1, 9, 0)).with_field("vaccine", "Flu");
        assert!(!same_record(&stored, &twin));
    }

    #[test]
    fn test_id_on_one_side_falls_back_to_fields() {
        let stored = legacy(at(1, 9, 0), "Flu");
        let mut target = legacy(at(1, 10, 0), "Flu");
        target.id = Some(uuid::Uuid::new_v4());
        assert!(same_record(&stored, &target));
    }

    #[test]
    fn test_locate_found_not_found_ambiguous() {
        let a = ("a.json.enc.ttl".to_string(), legacy(at(1, 9, 0), "Flu"));
        let b = ("b.json.enc.ttl".to_string(), legacy(at(2, 9, 0), "Flu"));
        let c = ("c.json.enc.ttl".to_string(), legacy(at(2, 18, 0), "Flu"));
        let files: Vec<String> = [&a, &b, &c].iter().map(|(n, _)| n.clone()).collect();
        let candidates = vec![a, b, c];

        assert_eq!(
            locate(&legacy(at(1, 12, 0), "Flu"), &candidates, &files, "x"),
            Match::Found("a.json.enc.ttl".into())
        );
        assert_eq!(
            locate(&legacy(at(5, 12, 0), "Flu"), &candidates, &files, "x"),
            Match::NotFound
        );
        assert_eq!(
            locate(&legacy(at(2, 12, 0), "Flu"), &candidates, &files, "x"),
            Match::Ambiguous(vec!["b.json.enc.ttl".into(), "c.json.enc.ttl".into()])
        );
    }

    #[test]
    fn test_locate_falls_back_to_name() {
        let files = vec!["expected.json.enc.ttl".to_string()];
        let target = legacy(at(1, 9, 0), "Flu");

        assert_eq!(
            locate(&target, &[], &files, "expected.json.enc.ttl"),
            Match::Found("expected.json.enc.ttl".into())
        );
        assert_eq!(
            locate(&target, &[], &files, "other.json.enc.ttl"),
            Match::NotFound
        );
    }

    #[test]
    fn test_locate_copies_sharing_an_id() {
        let original = Record::new(at(1, 9, 0)).with_field("vaccine", "Flu");
        let mut edited = original.clone();
        edited.timestamp = at(1, 10, 0);
        let other = Record::new(at(1, 9, 0)).with_field("vaccine", "Flu");
        let candidates = vec![
            ("a.json.enc.ttl".to_string(), original.clone()),
            ("b.json.enc.ttl".to_string(), edited),
            ("c.json.enc.ttl".to_string(), other),
        ];
        let files: Vec<String> = candidates.iter().map(|(n, _)| n.clone()).collect();

        assert_eq!(
            locate(&original, &candidates, &files, "x"),
            Match::Copies(vec!["a.json.enc.ttl".into(), "b.json.enc.ttl".into()])
        );
    }

    #[test]
    fn test_name_fallback_skips_blob_of_another_record() {
        let gone = Record::new(at(1, 9, 0)).with_field("vaccine", "Flu");
        let current = Record::new(at(1, 9, 0)).with_field("vaccine", "Tetanus");
        let candidates = vec![("expected.json.enc.ttl".to_string(), current)];
        let files = vec!["expected.json.enc.ttl".to_string()];

        assert_eq!(
            locate(&gone, &candidates, &files, "expected.json.enc.ttl"),
            Match::NotFound
        );

        // An unparsable blob under the expected name is still taken.
        assert_eq!(
            locate(&gone, &[], &files, "expected.json.enc.ttl"),
            Match::Found("expected.json.enc.ttl".into())
        );
    }
}
