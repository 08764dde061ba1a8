use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::feature::{FieldKind, Feature};
use super::timestamp;

/// A single field value of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Parses raw text (a CLI argument or CSV cell) as a value of `kind`.
    pub fn parse_as(kind: FieldKind, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match kind {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Integer => raw
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| format!("'{}' is not a whole number", raw)),
            FieldKind::Number => raw
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|_| format!("'{}' is not a number", raw)),
            FieldKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| FieldValue::Text(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| format!("'{}' is not a date (YYYY-MM-DD)", raw)),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Integer(n.into())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

/// One user-entered observation.
///
/// Serialized as `{"id": ..., "timestamp": ..., "responses": {...}}`. The `id`
/// is omitted when absent; blobs written before ids existed have none and are
/// identified by their field values instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(with = "timestamp::iso")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "responses", default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Creates a record with a fresh id.
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            timestamp: timestamp::normalize(timestamp),
            fields: BTreeMap::new(),
        }
    }

    /// Creates a record without an id, as older clients wrote them.
    pub fn legacy(timestamp: NaiveDateTime) -> Self {
        Self {
            id: None,
            ..Self::new(timestamp)
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Names of required fields of `feature` that are missing or blank.
    pub fn missing_required(&self, feature: Feature) -> Vec<&'static str> {
        feature
            .fields()
            .iter()
            .filter(|spec| spec.required)
            .filter(|spec| match self.fields.get(spec.name) {
                None | Some(FieldValue::Null) => true,
                Some(FieldValue::Text(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|spec| spec.name)
            .collect()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", timestamp::format(&self.timestamp))?;
        for (name, value) in &self.fields {
            write!(f, "  {}={}", name, value)?;
        }
        Ok(())
    }
}

/// Sorts records newest first.
pub fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Sorts records oldest first.
pub fn sort_oldest_first(records: &mut [Record]) {
    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

/// Keeps only the most recent record of each calendar day, newest first.
pub fn latest_per_day(mut records: Vec<Record>) -> Vec<Record> {
    sort_newest_first(&mut records);
    let mut last_day = None;
    records.retain(|r| {
        let day = r.date();
        if last_day == Some(day) {
            false
        } else {
            last_day = Some(day);
            true
        }
    });
    records
}
