use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of value a feature field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Number,
    /// Calendar date, stored as `YYYY-MM-DD` text.
    Date,
}

/// One field of a feature schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

const BLOOD_PRESSURE_FIELDS: &[FieldSpec] = &[
    required("systolic", FieldKind::Integer),
    required("diastolic", FieldKind::Integer),
    required("heart_rate", FieldKind::Integer),
    optional("feeling", FieldKind::Text),
    optional("notes", FieldKind::Text),
];

const VACCINATION_FIELDS: &[FieldSpec] = &[
    required("vaccine", FieldKind::Text),
    optional("provider", FieldKind::Text),
    optional("professional", FieldKind::Text),
    optional("cost", FieldKind::Text),
    optional("notes", FieldKind::Text),
];

const MEDICATION_FIELDS: &[FieldSpec] = &[
    required("name", FieldKind::Text),
    required("dosage", FieldKind::Text),
    required("frequency", FieldKind::Text),
    optional("start_date", FieldKind::Date),
    optional("notes", FieldKind::Text),
];

const DIARY_FIELDS: &[FieldSpec] = &[
    required("title", FieldKind::Text),
    optional("description", FieldKind::Text),
];

/// A data category with its own pod directory and field schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BloodPressure,
    Vaccination,
    Medication,
    Diary,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::BloodPressure,
        Feature::Vaccination,
        Feature::Medication,
        Feature::Diary,
    ];

    /// Directory name inside the pod root, also used as the blob prefix.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Feature::BloodPressure => "blood_pressure",
            Feature::Vaccination => "vaccination",
            Feature::Medication => "medication",
            Feature::Diary => "diary",
        }
    }

    /// CSV column holding the record timestamp.
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            Feature::BloodPressure | Feature::Medication => "timestamp",
            Feature::Vaccination | Feature::Diary => "date",
        }
    }

    /// Fields in schema order.
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Feature::BloodPressure => BLOOD_PRESSURE_FIELDS,
            Feature::Vaccination => VACCINATION_FIELDS,
            Feature::Medication => MEDICATION_FIELDS,
            Feature::Diary => DIARY_FIELDS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// CSV header: timestamp column first, then fields in schema order.
    pub fn columns(&self) -> Vec<&'static str> {
        std::iter::once(self.timestamp_column())
            .chain(self.fields().iter().map(|f| f.name))
            .collect()
    }

    /// Columns an imported CSV must provide.
    pub fn required_columns(&self) -> Vec<&'static str> {
        std::iter::once(self.timestamp_column())
            .chain(self.fields().iter().filter(|f| f.required).map(|f| f.name))
            .collect()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::BloodPressure => write!(f, "blood-pressure"),
            Feature::Vaccination => write!(f, "vaccination"),
            Feature::Medication => write!(f, "medication"),
            Feature::Diary => write!(f, "diary"),
        }
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blood-pressure" | "blood_pressure" | "bp" => Ok(Feature::BloodPressure),
            "vaccination" => Ok(Feature::Vaccination),
            "medication" => Ok(Feature::Medication),
            "diary" => Ok(Feature::Diary),
            _ => Err(format!(
                "Invalid feature '{}'. Valid options: blood-pressure, vaccination, medication, diary",
                s
            )),
        }
    }
}
