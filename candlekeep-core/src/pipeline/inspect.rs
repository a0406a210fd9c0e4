//! Dataset inspection: range, schema health and descriptive statistics.
//!
//! Unlike onboarding, inspection never fails on integrity problems. It counts
//! them so an operator can decide what to do.

use super::PipelineError;
use crate::data::read_candles;
use crate::domain::{Field, RawCandle};
use crate::integrity::find_gaps;
use std::path::Path;

const SAMPLE_ROWS: usize = 5;

/// Descriptive statistics of one numeric column, over its present values.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub name: &'static str,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1).
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl ColumnStats {
    /// Statistics for `values`; all NaN when there are none.
    pub fn describe(name: &'static str, mut values: Vec<f64>) -> Self {
        values.sort_by(|a, b| a.total_cmp(b));
        let n = values.len();
        let mean = if n == 0 {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / n as f64
        };
        let std = if n < 2 {
            f64::NAN
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        };

        Self {
            name,
            count: n,
            mean,
            std,
            min: values.first().copied().unwrap_or(f64::NAN),
            p25: quantile(&values, 0.25),
            p50: quantile(&values, 0.50),
            p75: quantile(&values, 0.75),
            max: values.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    /// Absent values per value column, in schema order.
    pub missing: Vec<(Field, usize)>,
    /// Rows whose timestamp already appeared earlier in the file.
    pub duplicate_timestamps: usize,
    /// Whether the file is in ascending timestamp order.
    pub sorted: bool,
    pub gap_count: usize,
    pub missing_steps: i64,
    /// `timestamp` first, then the five value columns.
    pub columns: Vec<ColumnStats>,
    pub head: Vec<RawCandle>,
    pub tail: Vec<RawCandle>,
}

impl DatasetProfile {
    pub fn total_missing(&self) -> usize {
        self.missing.iter().map(|(_, n)| n).sum()
    }
}

/// Profile records in file order.
pub fn profile(candles: &[RawCandle], step_secs: i64) -> DatasetProfile {
    let mut timestamps: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
    let sorted = timestamps.windows(2).all(|w| w[0] <= w[1]);
    timestamps.sort_unstable();
    let before_dedup = timestamps.len();
    timestamps.dedup();
    let duplicate_timestamps = before_dedup - timestamps.len();

    let gaps = find_gaps(timestamps.iter().copied(), step_secs);
    let missing_steps = gaps.iter().map(|g| g.missing_steps(step_secs)).sum();

    let missing = Field::ALL
        .iter()
        .map(|&f| (f, candles.iter().filter(|c| c.get(f).is_none()).count()))
        .collect();

    let mut columns = vec![ColumnStats::describe(
        "timestamp",
        candles.iter().map(|c| c.timestamp as f64).collect(),
    )];
    columns.extend(Field::ALL.iter().map(|&f| {
        ColumnStats::describe(f.name(), candles.iter().filter_map(|c| c.get(f)).collect())
    }));

    DatasetProfile {
        row_count: candles.len(),
        first_timestamp: timestamps.first().copied(),
        last_timestamp: timestamps.last().copied(),
        missing,
        duplicate_timestamps,
        sorted,
        gap_count: gaps.len(),
        missing_steps,
        columns,
        head: candles.iter().take(SAMPLE_ROWS).copied().collect(),
        tail: candles[candles.len().saturating_sub(SAMPLE_ROWS)..].to_vec(),
    }
}

/// Load and profile a dataset file.
pub fn inspect(path: &Path, step_secs: i64) -> Result<DatasetProfile, PipelineError> {
    let candles = read_candles(path)?;
    tracing::info!(records = candles.len(), path = %path.display(), "loaded dataset");
    Ok(profile(&candles, step_secs))
}
