//! Onboarding: reconcile the bulk history with its gap-fill file and publish
//! the longest verified-continuous prefix.

use super::PipelineError;
use crate::config::OnboardConfig;
use crate::data::{read_candles, write_candles, DatasetMeta};
use crate::domain::{Candle, RawCandle};
use crate::integrity::{
    into_candles, merge_counted, truncate_at, validate, ContinuityReport, IntegrityError,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// Publishable result of merge → validate → truncate.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub candles: Vec<Candle>,
    pub merged_count: usize,
    pub filled: usize,
    pub shadowed: usize,
    pub report: ContinuityReport,
}

impl Reconciled {
    /// Merged records discarded by truncation.
    pub fn dropped(&self) -> usize {
        self.merged_count - self.candles.len()
    }
}

/// Merge, validate and truncate in memory. No I/O.
pub fn reconcile(
    primary: &[RawCandle],
    gap_fill: &[RawCandle],
    step_secs: i64,
) -> Result<Reconciled, IntegrityError> {
    let merged = merge_counted(primary, gap_fill)?;
    let report = validate(&merged.candles, step_secs)?;
    let candles = into_candles(truncate_at(&merged.candles, report.boundary))?;

    Ok(Reconciled {
        candles,
        merged_count: merged.candles.len(),
        filled: merged.filled,
        shadowed: merged.shadowed,
        report,
    })
}

#[derive(Debug, Clone)]
pub struct OnboardSummary {
    pub primary_count: usize,
    pub gap_fill_count: usize,
    pub merged_count: usize,
    pub filled: usize,
    pub shadowed: usize,
    pub published_count: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub report: ContinuityReport,
    pub output: PathBuf,
    pub meta_path: Option<PathBuf>,
}

impl OnboardSummary {
    pub fn dropped(&self) -> usize {
        self.merged_count - self.published_count
    }
}

/// Read both inputs, reconcile them, and publish the result.
///
/// Nothing is written unless every structural check passes.
pub fn onboard(config: &OnboardConfig, step_secs: i64) -> Result<OnboardSummary, PipelineError> {
    let primary = read_candles(&config.bulk_path)?;
    info!(records = primary.len(), path = %config.bulk_path.display(), "loaded bulk data");

    let gap_fill = read_candles(&config.gap_fill_path)?;
    info!(records = gap_fill.len(), path = %config.gap_fill_path.display(), "loaded gap-fill data");

    let reconciled = reconcile(&primary, &gap_fill, step_secs)?;
    info!(
        merged = reconciled.merged_count,
        filled = reconciled.filled,
        shadowed = reconciled.shadowed,
        "merged datasets"
    );

    if let Some(boundary) = reconciled.report.boundary {
        warn!(
            gaps = reconciled.report.gaps.len(),
            missing_steps = reconciled.report.missing_steps(),
            boundary,
            dropped = reconciled.dropped(),
            "continuity gaps remain; truncating before first gap"
        );
    } else {
        info!("no continuity gaps");
    }

    let output = config.published_path();
    write_candles(&output, &reconciled.candles)?;
    info!(records = reconciled.candles.len(), path = %output.display(), "published dataset");

    let meta_path = if config.write_meta {
        let meta = DatasetMeta::describe(
            &reconciled.candles,
            reconciled.report.boundary,
            reconciled.report.gaps.len(),
        );
        Some(meta.write(&output)?)
    } else {
        if DatasetMeta::remove(&output)? {
            info!(path = %output.display(), "removed stale metadata sidecar");
        }
        None
    };

    Ok(OnboardSummary {
        primary_count: primary.len(),
        gap_fill_count: gap_fill.len(),
        merged_count: reconciled.merged_count,
        filled: reconciled.filled,
        shadowed: reconciled.shadowed,
        published_count: reconciled.candles.len(),
        first_timestamp: reconciled.candles.first().map(|c| c.timestamp),
        last_timestamp: reconciled.candles.last().map(|c| c.timestamp),
        report: reconciled.report,
        output,
        meta_path,
    })
}
