//! CSV import and export.
//!
//! The CSV layout of a feature is its timestamp column followed by its
//! fields in schema order, e.g. for vaccinations:
//!
//! ```text
//! date,vaccine,provider,professional,cost,notes
//! ```

mod export;
mod import;

use thiserror::Error;

use crate::client::RecordError;
use crate::models::Feature;

pub use export::export_csv;
pub use import::{import_csv, ImportSummary};

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("No {0} records found to export")]
    NoRecords(Feature),
    #[error("CSV is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Record(#[from] RecordError),
}
