//! Forward-fill of empty minutes in the recent-updates file.

use crate::domain::{Field, RawCandle};

/// Reindex an ascending, duplicate-free run onto every step between its first
/// and last timestamp.
///
/// An absent minute becomes a flat candle at the last known close with zero
/// volume. A present record keeps its values; blank open/high/low take the
/// carried close and blank volume becomes zero. Before the first known close
/// there is nothing to carry, so blanks stay blank.
pub fn fill_missing_minutes(candles: &[RawCandle], step_secs: i64) -> Vec<RawCandle> {
    let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
        return Vec::new();
    };

    let mut filled = Vec::with_capacity(candles.len());
    let mut carried: Option<f64> = None;
    let mut records = candles.iter().peekable();
    let mut ts = first.timestamp;

    while ts <= last.timestamp {
        let mut row = match records.next_if(|c| c.timestamp == ts) {
            Some(c) => *c,
            None => RawCandle {
                timestamp: ts,
                open: None,
                high: None,
                low: None,
                close: None,
                volume: None,
            },
        };

        carried = row.get(Field::Close).or(carried);
        row.close = carried;
        row.open = row.get(Field::Open).or(carried);
        row.high = row.get(Field::High).or(carried);
        row.low = row.get(Field::Low).or(carried);
        row.volume = Some(row.get(Field::Volume).unwrap_or(0.0));
        filled.push(row);

        // Off-grid records are kept as-is rather than dropped.
        let Some(next) = ts.checked_add(step_secs) else {
            filled.extend(records.by_ref().copied());
            break;
        };
        while let Some(c) = records.next_if(|c| c.timestamp < next) {
            filled.push(*c);
        }
        ts = next;
    }

    filled
}
