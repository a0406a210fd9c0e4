//! End-to-end runs: onboarding the history, the daily update, inspection.

pub mod inspect;
pub mod onboard;
pub mod update;

pub use inspect::{inspect, profile, ColumnStats, DatasetProfile};
pub use onboard::{onboard, reconcile, OnboardSummary, Reconciled};
pub use update::{
    append_recent, check_recent, fetch_range, missing_interval, run_update, FetchOutcome,
    RecentIntegrity, UpdateSummary,
};

use crate::data::{DatasetError, FetchError, MetaError};
use crate::integrity::IntegrityError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("bulk dataset not found at {}; unpack it or run `onboard` first", .0.display())]
    BulkDatasetMissing(PathBuf),

    #[error("no historical timestamps in {}", .0.display())]
    EmptyHistory(PathBuf),
}
