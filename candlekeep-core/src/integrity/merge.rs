//! Merger — folds sparse gap-fill candles into a sorted primary history.

use super::validate::check_ascending;
use super::IntegrityError;
use crate::domain::RawCandle;

/// Merged sequence plus how the gap-fill input was used.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub candles: Vec<RawCandle>,
    /// Gap-fill records that landed in a hole of the primary sequence.
    pub filled: usize,
    /// Gap-fill records dropped because the primary already had that timestamp.
    pub shadowed: usize,
}

/// Merge `primary` with `gap_fill`, primary values winning on key collision.
///
/// See [`merge_counted`] for the contract.
pub fn merge(
    primary: &[RawCandle],
    gap_fill: &[RawCandle],
) -> Result<Vec<RawCandle>, IntegrityError> {
    merge_counted(primary, gap_fill).map(|outcome| outcome.candles)
}

/// Merge `primary` with `gap_fill` and report how many gap-fill records were used.
///
/// `primary` must already be strictly ascending; a repeated or out-of-order
/// timestamp is returned as an error rather than repaired. `gap_fill` may be in
/// any order and may repeat itself, in which case the first occurrence wins.
pub fn merge_counted(
    primary: &[RawCandle],
    gap_fill: &[RawCandle],
) -> Result<MergeOutcome, IntegrityError> {
    check_ascending(primary)?;

    // Stable sort keeps file order among equal keys, so dedup keeps the first.
    let mut fills = gap_fill.to_vec();
    fills.sort_by_key(|c| c.timestamp);
    fills.dedup_by_key(|c| c.timestamp);

    let mut candles = Vec::with_capacity(primary.len() + fills.len());
    let mut filled = 0;
    let mut shadowed = 0;
    let mut fills = fills.into_iter().peekable();

    for p in primary {
        while let Some(f) = fills.next_if(|f| f.timestamp <= p.timestamp) {
            if f.timestamp == p.timestamp {
                shadowed += 1;
            } else {
                candles.push(f);
                filled += 1;
            }
        }
        candles.push(*p);
    }
    for f in fills {
        candles.push(f);
        filled += 1;
    }

    Ok(MergeOutcome {
        candles,
        filled,
        shadowed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ts: i64, price: f64, volume: f64) -> RawCandle {
        RawCandle {
            timestamp: ts,
            open: Some(price),
            high: Some(price),
            low: Some(price),
            close: Some(price),
            volume: Some(volume),
        }
    }

    fn timestamps(candles: &[RawCandle]) -> Vec<i64> {
        candles.iter().map(|c| c.timestamp).collect()
    }

    #[test]
    fn fills_hole_between_primary_records() {
        let primary = vec![raw(0, 1.0, 10.0), raw(60, 1.0, 10.0), raw(180, 1.0, 10.0)];
        let gap_fill = vec![raw(120, 2.0, 20.0)];

        let outcome = merge_counted(&primary, &gap_fill).unwrap();

        assert_eq!(timestamps(&outcome.candles), vec![0, 60, 120, 180]);
        assert_eq!(outcome.candles[2].close, Some(2.0));
        assert_eq!(outcome.candles[2].volume, Some(20.0));
        assert_eq!(outcome.filled, 1);
        assert_eq!(outcome.shadowed, 0);
    }

    #[test]
    fn primary_wins_on_collision() {
        let primary = vec![raw(0, 1.0, 10.0), raw(60, 1.0, 10.0)];
        let gap_fill = vec![raw(60, 9.0, 99.0)];

        let outcome = merge_counted(&primary, &gap_fill).unwrap();

        assert_eq!(timestamps(&outcome.candles), vec![0, 60]);
        assert_eq!(outcome.candles[1].close, Some(1.0));
        assert_eq!(outcome.shadowed, 1);
        assert_eq!(outcome.filled, 0);
    }

    #[test]
    fn unsorted_gap_fill_lands_in_order() {
        let primary = vec![raw(60, 1.0, 1.0), raw(240, 1.0, 1.0)];
        let gap_fill = vec![raw(300, 2.0, 2.0), raw(0, 2.0, 2.0), raw(180, 2.0, 2.0)];

        let merged = merge(&primary, &gap_fill).unwrap();

        assert_eq!(timestamps(&merged), vec![0, 60, 180, 240, 300]);
    }

    #[test]
    fn repeated_gap_fill_keeps_first_occurrence() {
        let primary = vec![raw(0, 1.0, 1.0)];
        let gap_fill = vec![raw(60, 3.0, 3.0), raw(60, 4.0, 4.0)];

        let merged = merge(&primary, &gap_fill).unwrap();

        assert_eq!(timestamps(&merged), vec![0, 60]);
        assert_eq!(merged[1].open, Some(3.0));
    }

    #[test]
    fn duplicate_primary_is_rejected() {
        let primary = vec![raw(0, 1.0, 1.0), raw(60, 1.0, 1.0), raw(60, 2.0, 2.0)];

        let err = merge(&primary, &[]).unwrap_err();

        assert_eq!(err, IntegrityError::DuplicateTimestamp { timestamp: 60 });
    }

    #[test]
    fn unsorted_primary_is_rejected() {
        let primary = vec![raw(120, 1.0, 1.0), raw(60, 1.0, 1.0)];

        let err = merge(&primary, &[]).unwrap_err();

        assert!(matches!(
            err,
            IntegrityError::InputOrdering {
                index: 1,
                previous: 120,
                timestamp: 60
            }
        ));
    }

    #[test]
    fn empty_inputs_merge_to_empty() {
        assert!(merge(&[], &[]).unwrap().is_empty());
        assert_eq!(timestamps(&merge(&[], &[raw(60, 1.0, 1.0)]).unwrap()), vec![60]);
    }
}
