//! Integration tests for the daily update, driven by a canned candle source.

use candlekeep_core::config::UpdateConfig;
use candlekeep_core::data::{read_candles, write_candles, CandleSource, FetchError};
use candlekeep_core::domain::{Candle, RawCandle, MINUTE_SECS};
use candlekeep_core::pipeline::{run_update, PipelineError};
use std::cell::Cell;
use std::path::Path;
use tempfile::TempDir;

/// Serves a fixed set of candles, like an exchange that has published them.
struct Canned {
    candles: Vec<RawCandle>,
    calls: Cell<usize>,
    fail: bool,
}

impl Canned {
    fn new(candles: Vec<RawCandle>) -> Self {
        Self {
            candles,
            calls: Cell::new(0),
            fail: false,
        }
    }
}

impl CandleSource for Canned {
    fn name(&self) -> &str {
        "canned"
    }

    fn fetch(
        &self,
        _pair: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<RawCandle>, FetchError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(FetchError::RateLimited { retry_after_secs: 10 });
        }
        Ok(self
            .candles
            .iter()
            .filter(|c| (start..=end).contains(&c.timestamp))
            .take(limit)
            .copied()
            .collect())
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn raw(ts: i64, close: f64) -> RawCandle {
    RawCandle::from(Candle::flat(ts, close))
}

fn setup(dir: &Path, bulk: &[Candle], recent: Option<&[RawCandle]>) -> UpdateConfig {
    let config = UpdateConfig {
        bulk_path: dir.join("historical.csv"),
        recent_path: dir.join("recent").join("latest.csv"),
        page_limit: 4,
        ..UpdateConfig::default()
    };
    write_candles(&config.bulk_path, bulk).unwrap();
    if let Some(rows) = recent {
        write_candles(&config.recent_path, rows).unwrap();
    }
    config
}

fn timestamps(path: &Path) -> Vec<i64> {
    read_candles(path).unwrap().iter().map(|c| c.timestamp).collect()
}

#[test]
fn first_run_starts_after_bulk_history() {
    let dir = TempDir::new().unwrap();
    let bulk = [Candle::flat(0, 1.0), Candle::flat(60, 1.0)];
    let config = setup(dir.path(), &bulk, None);
    let source = Canned::new((0..12).map(|m| raw(m * 60, 2.0)).collect());

    // now = 00:10:30 → last closed minute is 00:09:00
    let summary = run_update(&config, MINUTE_SECS, &source, 630).unwrap();

    assert_eq!(summary.last_known, 60);
    assert_eq!(summary.interval, Some((120, 540)));
    assert_eq!(summary.fetched, 8);
    assert_eq!(summary.pages, 2);
    assert!(summary.written);
    assert!(summary.integrity.is_clean());
    assert_eq!(
        timestamps(&config.recent_path),
        (2..=9).map(|m| m * 60).collect::<Vec<_>>()
    );
}

#[test]
fn existing_recent_file_is_extended() {
    let dir = TempDir::new().unwrap();
    let recent = [raw(120, 1.0), raw(180, 1.0)];
    let config = setup(dir.path(), &[Candle::flat(60, 1.0)], Some(&recent));
    let source = Canned::new(vec![raw(180, 9.0), raw(240, 2.0), raw(300, 2.0)]);

    let summary = run_update(&config, MINUTE_SECS, &source, 390).unwrap();

    assert_eq!(summary.last_known, 180);
    assert_eq!(summary.interval, Some((240, 300)));
    assert_eq!(summary.previous_rows, 2);
    assert_eq!(summary.appended(), 2);

    let rows = read_candles(&config.recent_path).unwrap();
    assert_eq!(timestamps(&config.recent_path), vec![120, 180, 240, 300]);
    assert_eq!(rows[1].close, Some(1.0));
}

#[test]
fn missing_minutes_are_forward_filled() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path(), &[Candle::flat(0, 1.0)], None);
    let source = Canned::new(vec![raw(60, 5.0), raw(240, 7.0)]);

    let summary = run_update(&config, MINUTE_SECS, &source, 300).unwrap();

    assert!(summary.integrity.is_clean());
    let rows = read_candles(&config.recent_path).unwrap();
    assert_eq!(timestamps(&config.recent_path), vec![60, 120, 180, 240]);
    assert_eq!(rows[1].close, Some(5.0));
    assert_eq!(rows[1].open, Some(5.0));
    assert_eq!(rows[1].volume, Some(0.0));
    assert_eq!(rows[3].close, Some(7.0));
}

#[test]
fn up_to_date_recent_file_is_untouched() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path(), &[Candle::flat(0, 1.0)], Some(&[raw(240, 1.0)]));
    let source = Canned::new(Vec::new());

    let summary = run_update(&config, MINUTE_SECS, &source, 330).unwrap();

    assert_eq!(summary.interval, None);
    assert!(!summary.written);
    assert_eq!(source.calls.get(), 0);
}

#[test]
fn fetch_failure_leaves_recent_file_alone() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path(), &[Candle::flat(0, 1.0)], Some(&[raw(60, 1.0)]));
    let before = std::fs::read(&config.recent_path).unwrap();
    let mut source = Canned::new(vec![raw(120, 2.0)]);
    source.fail = true;

    let summary = run_update(&config, MINUTE_SECS, &source, 600).unwrap();

    assert!(matches!(summary.fetch_error, Some(FetchError::RateLimited { .. })));
    assert!(!summary.written);
    assert_eq!(std::fs::read(&config.recent_path).unwrap(), before);
}

#[test]
fn missing_bulk_dataset_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = UpdateConfig {
        bulk_path: dir.path().join("absent.csv"),
        recent_path: dir.path().join("recent.csv"),
        ..UpdateConfig::default()
    };
    let source = Canned::new(Vec::new());

    let err = run_update(&config, MINUTE_SECS, &source, 600).unwrap_err();

    assert!(matches!(err, PipelineError::BulkDatasetMissing(_)));
    assert_eq!(source.calls.get(), 0);
}

#[test]
fn empty_history_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path(), &[], None);
    let source = Canned::new(Vec::new());

    let err = run_update(&config, MINUTE_SECS, &source, 600).unwrap_err();

    assert!(matches!(err, PipelineError::EmptyHistory(_)));
}
