//! Integrity pipeline: merge a primary history with gap-fill records, then
//! validate the result before it is published.
//!
//! Structural problems (ordering, duplicate keys, missing values) are fatal and
//! surface as [`IntegrityError`]. Continuity gaps are not errors; they are
//! collected into a [`ContinuityReport`] and the caller truncates at the
//! reported boundary.

pub mod merge;
pub mod validate;

pub use merge::{merge, merge_counted, MergeOutcome};
pub use validate::{
    check_ascending, check_fields, find_gaps, into_candles, truncate_at, validate,
    ContinuityGap, ContinuityReport,
};

use crate::domain::Field;
use thiserror::Error;

/// Fatal integrity violations. Any of these aborts a run before output is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    #[error("input not sorted: timestamp {timestamp} at row {index} follows {previous}")]
    InputOrdering {
        index: usize,
        previous: i64,
        timestamp: i64,
    },

    #[error("duplicate timestamp {timestamp}")]
    DuplicateTimestamp { timestamp: i64 },

    #[error("missing value in column '{field}' at timestamp {timestamp}")]
    MissingField { timestamp: i64, field: Field },

    #[error("negative volume {volume} at timestamp {timestamp}")]
    NegativeVolume { timestamp: i64, volume: f64 },
}
