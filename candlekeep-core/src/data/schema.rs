use super::dataset::DatasetError;
use chrono::DateTime;
use csv::StringRecord;
use std::num::ParseFloatError;

/// Column layout of every candle file: `timestamp,open,high,low,close,volume`.
pub struct CandleSchema;

impl CandleSchema {
    /// Canonical header, in write order.
    pub const HEADER: [&'static str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

    /// Accepted spellings of the key column. Bulk exports use `Timestamp`,
    /// gap-fill exports use `timestamp_unix`.
    const TIMESTAMP_ALIASES: [&'static str; 4] = ["timestamp", "timestamp_unix", "unix", "time"];

    /// Resolve a header row to column positions, matching names case-insensitively.
    pub fn resolve(headers: &StringRecord) -> Result<ColumnMap, DatasetError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| DatasetError::MissingColumn(names[0].to_string()))
        };

        Ok(ColumnMap {
            timestamp: require(&Self::TIMESTAMP_ALIASES)?,
            values: [
                require(&["open"])?,
                require(&["high"])?,
                require(&["low"])?,
                require(&["close"])?,
                require(&["volume"])?,
            ],
        })
    }
}

/// Positions of the schema columns within a particular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub timestamp: usize,
    /// open, high, low, close, volume.
    pub values: [usize; 5],
}

/// Parse a key cell. Integral floats (`1325317920.0`) are accepted.
///
/// Only timestamps `chrono` can represent as a UTC date are accepted, which
/// keeps step arithmetic on them far from `i64` overflow.
pub fn parse_timestamp(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    let ts = match cell.parse::<i64>() {
        Ok(ts) => ts,
        Err(_) => {
            let f = cell.parse::<f64>().ok()?;
            if !(f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64) {
                return None;
            }
            f as i64
        }
    };
    DateTime::from_timestamp(ts, 0).map(|_| ts)
}

/// Parse a value cell. Blank, `NaN` and `null` are absent values; anything
/// else that is not a number is an error.
pub fn parse_value(cell: &str) -> Result<Option<f64>, ParseFloatError> {
    let cell = cell.trim();
    if cell.is_empty()
        || cell.eq_ignore_ascii_case("nan")
        || cell.eq_ignore_ascii_case("null")
        || cell.eq_ignore_ascii_case("none")
    {
        return Ok(None);
    }
    cell.parse::<f64>().map(Some)
}
