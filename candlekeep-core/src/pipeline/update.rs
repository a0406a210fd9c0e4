//! Daily update: append newly published candles to the recent file.
//!
//! This path trusts the exchange. It repairs empty minutes inside the recent
//! file and logs integrity warnings, but never truncates and never checks
//! continuity against the historical dataset.

use super::PipelineError;
use crate::config::UpdateConfig;
use crate::data::{
    fill_missing_minutes, last_timestamp, read_candles, write_candles, CandleSource, FetchError,
};
use crate::domain::RawCandle;
use crate::integrity::find_gaps;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The span still to fetch: from one step after `last` up to the last closed
/// minute before `now`. The minute in progress is never requested.
pub fn missing_interval(last: i64, now: i64, step_secs: i64) -> Option<(i64, i64)> {
    let current = now.div_euclid(step_secs) * step_secs - step_secs;
    (last < current).then_some((last + step_secs, current))
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub candles: Vec<RawCandle>,
    pub pages: usize,
    /// Why fetching ended early, if it did. Pages already fetched are kept.
    pub stopped: Option<FetchError>,
}

/// Page through `[start, end]`, at most `page_limit` candles per request.
///
/// Each request asks for exactly the number of minutes its window spans, since
/// the exchange honours `limit` over `end`. Paging continues from the last
/// returned timestamp and stops at the first empty page or failure.
pub fn fetch_range(
    source: &dyn CandleSource,
    pair: &str,
    start: i64,
    end: i64,
    page_limit: usize,
    step_secs: i64,
) -> FetchOutcome {
    let mut candles = Vec::new();
    let mut pages = 0;
    let mut cursor = start;

    while cursor <= end {
        let remaining = ((end - cursor) / step_secs + 1) as usize;
        let limit = remaining.min(page_limit);
        let window_end = (cursor + (limit as i64 - 1) * step_secs).min(end);

        if !source.is_available() {
            return FetchOutcome {
                candles,
                pages,
                stopped: Some(FetchError::CircuitBreakerTripped),
            };
        }

        debug!(from = cursor, to = window_end, limit, "requesting page");
        let page = match source.fetch(pair, cursor, window_end, limit) {
            Ok(page) => page,
            Err(e) => {
                warn!(from = cursor, to = window_end, error = %e, "fetch failed; keeping earlier pages");
                return FetchOutcome {
                    candles,
                    pages,
                    stopped: Some(e),
                };
            }
        };
        pages += 1;

        let Some(newest) = page.iter().map(|c| c.timestamp).max() else {
            warn!(from = cursor, to = window_end, "no data returned for window");
            break;
        };
        debug!(records = page.len(), newest, "page received");
        candles.extend(page);

        if newest < cursor {
            warn!(newest, cursor, "exchange returned only older data; stopping");
            break;
        }
        cursor = newest + step_secs;
    }

    FetchOutcome {
        candles,
        pages,
        stopped: None,
    }
}

/// Existing rows followed by fetched rows, one row per timestamp (the first
/// seen wins), ascending.
pub fn append_recent(existing: &[RawCandle], fetched: Vec<RawCandle>) -> Vec<RawCandle> {
    let mut combined = Vec::with_capacity(existing.len() + fetched.len());
    combined.extend_from_slice(existing);
    combined.extend(fetched);
    combined.sort_by_key(|c| c.timestamp);
    combined.dedup_by_key(|c| c.timestamp);
    combined
}

/// Problems in the recent file worth an operator's attention. Never fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentIntegrity {
    pub missing_minutes: Vec<i64>,
    pub null_rows: usize,
}

impl RecentIntegrity {
    pub fn is_clean(&self) -> bool {
        self.missing_minutes.is_empty() && self.null_rows == 0
    }
}

/// Check an ascending recent run for holes and blank values, logging each finding.
pub fn check_recent(candles: &[RawCandle], step_secs: i64) -> RecentIntegrity {
    let missing_minutes: Vec<i64> = find_gaps(candles.iter().map(|c| c.timestamp), step_secs)
        .iter()
        .flat_map(|g| g.missing_timestamps(step_secs))
        .collect();
    let null_rows = candles.iter().filter(|c| c.first_missing().is_some()).count();

    if missing_minutes.is_empty() {
        info!("no missing minutes detected");
    } else {
        warn!(count = missing_minutes.len(), first = missing_minutes[0], "missing minutes detected");
    }
    if null_rows == 0 {
        info!("no null values detected");
    } else {
        warn!(rows = null_rows, "null values detected");
    }

    RecentIntegrity {
        missing_minutes,
        null_rows,
    }
}

#[derive(Debug)]
pub struct UpdateSummary {
    pub recent_path: PathBuf,
    /// Last known timestamp before this run.
    pub last_known: i64,
    /// `None` when the recent file was already current.
    pub interval: Option<(i64, i64)>,
    pub pages: usize,
    pub fetched: usize,
    pub previous_rows: usize,
    pub total_rows: usize,
    pub fetch_error: Option<FetchError>,
    pub integrity: RecentIntegrity,
    pub written: bool,
}

impl UpdateSummary {
    pub fn appended(&self) -> usize {
        self.total_rows.saturating_sub(self.previous_rows)
    }
}

/// Bring the recent file up to `now` (Unix seconds) from `source`.
pub fn run_update(
    config: &UpdateConfig,
    step_secs: i64,
    source: &dyn CandleSource,
    now: i64,
) -> Result<UpdateSummary, PipelineError> {
    if !config.bulk_path.exists() {
        return Err(PipelineError::BulkDatasetMissing(config.bulk_path.clone()));
    }

    let existing = if config.recent_path.exists() {
        read_candles(&config.recent_path)?
    } else {
        info!(path = %config.recent_path.display(), "recent file not found; starting empty");
        Vec::new()
    };

    let last_known = match existing.iter().map(|c| c.timestamp).max() {
        Some(ts) => ts,
        None => last_timestamp(&config.bulk_path)?
            .ok_or_else(|| PipelineError::EmptyHistory(config.bulk_path.clone()))?,
    };
    debug!(last_known, "last known timestamp");

    let mut summary = UpdateSummary {
        recent_path: config.recent_path.clone(),
        last_known,
        interval: None,
        pages: 0,
        fetched: 0,
        previous_rows: existing.len(),
        total_rows: existing.len(),
        fetch_error: None,
        integrity: RecentIntegrity::default(),
        written: false,
    };

    let Some((start, end)) = missing_interval(last_known, now, step_secs) else {
        info!(last_known, "recent data already up to date");
        return Ok(summary);
    };
    summary.interval = Some((start, end));
    info!(start, end, source = source.name(), "fetching missing interval");

    let outcome = fetch_range(source, &config.pair, start, end, config.page_limit, step_secs);
    summary.pages = outcome.pages;
    summary.fetched = outcome.candles.len();
    summary.fetch_error = outcome.stopped;

    if outcome.candles.is_empty() {
        info!("no new data found to append");
        return Ok(summary);
    }

    let combined = append_recent(&existing, outcome.candles);
    let filled = fill_missing_minutes(&combined, step_secs);
    summary.integrity = check_recent(&filled, step_secs);

    write_candles(&config.recent_path, &filled)?;
    summary.total_rows = filled.len();
    summary.written = true;
    info!(
        records = filled.len(),
        appended = summary.appended(),
        path = %config.recent_path.display(),
        "saved recent dataset"
    );

    Ok(summary)
}
