mod feature;
mod record;
pub mod timestamp;

pub use feature::{Feature, FieldKind, FieldSpec};
pub use record::{latest_per_day, sort_newest_first, sort_oldest_first, FieldValue, Record};
pub use timestamp::TimestampError;
