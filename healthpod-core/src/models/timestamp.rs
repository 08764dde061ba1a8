//! Record timestamps.
//!
//! Timestamps are naive local date-times kept at millisecond precision. The
//! canonical text form is `YYYY-MM-DDTHH:MM:SS.mmm`, which is what gets
//! persisted in record blobs and exported to CSV.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound};
use thiserror::Error;

/// Canonical textual form of a record timestamp.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Accepted naive date-time layouts, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Error, PartialEq)]
pub enum TimestampError {
    #[error("Empty timestamp")]
    Empty,
    #[error("Unrecognised timestamp '{0}'. Use YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]")]
    Invalid(String),
}

/// Truncates a timestamp to the precision records are stored with.
pub fn normalize(ts: NaiveDateTime) -> NaiveDateTime {
    ts.trunc_subsecs(3)
}

/// Formats a timestamp in canonical form.
pub fn format(ts: &NaiveDateTime) -> String {
    ts.format(CANONICAL_FORMAT).to_string()
}

/// Formats a timestamp for use inside a blob name: the canonical form with
/// `:` and `.` replaced by `-`.
pub fn blob_safe(ts: &NaiveDateTime) -> String {
    format(ts).replace(&[':', '.'][..], "-")
}

/// Parses a timestamp in any accepted layout and normalizes it.
///
/// RFC 3339 values with an offset keep their wall-clock time; a bare date
/// becomes midnight.
pub fn parse(input: &str) -> Result<NaiveDateTime, TimestampError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(TimestampError::Empty);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(normalize(dt.naive_local()));
    }

    for layout in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, layout) {
            return Ok(normalize(ts));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TimestampError::Invalid(s.to_string()))
}

/// Serde adapter that writes the canonical form and reads any accepted layout.
pub mod iso {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse(&s).map_err(de::Error::custom)
    }
}
