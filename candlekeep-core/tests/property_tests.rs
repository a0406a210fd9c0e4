//! Property tests for merge and validation invariants.
//!
//! Uses proptest to verify:
//! 1. Ordering — merged output is strictly ascending with unique timestamps
//! 2. Precedence — every primary record survives unchanged
//! 3. Coverage — merged keys are exactly the union of both inputs
//! 4. Idempotence — merging a result with the same gap-fill changes nothing
//! 5. Truncation — the published prefix is evenly spaced by one step

use candlekeep_core::domain::{RawCandle, MINUTE_SECS};
use candlekeep_core::integrity::{find_gaps, merge, truncate_at, validate};
use proptest::prelude::*;
use std::collections::BTreeSet;

// ── Strategies (proptest) ────────────────────────────────────────────

fn candle(minute: i64, price: f64) -> RawCandle {
    RawCandle {
        timestamp: minute * MINUTE_SECS,
        open: Some(price),
        high: Some(price),
        low: Some(price),
        close: Some(price),
        volume: Some(1.0),
    }
}

/// Strictly ascending primary series drawn from the first 200 minutes.
fn arb_primary() -> impl Strategy<Value = Vec<RawCandle>> {
    prop::collection::btree_set(0..200_i64, 0..80)
        .prop_map(|minutes| minutes.into_iter().map(|m| candle(m, 1.0)).collect())
}

/// Gap-fill in arbitrary order, possibly repeating itself.
fn arb_gap_fill() -> impl Strategy<Value = Vec<RawCandle>> {
    prop::collection::vec((0..200_i64, 2.0..3.0_f64), 0..80)
        .prop_map(|rows| rows.into_iter().map(|(m, p)| candle(m, p)).collect())
}

fn keys(candles: &[RawCandle]) -> BTreeSet<i64> {
    candles.iter().map(|c| c.timestamp).collect()
}

proptest! {
    // ── 1. Ordering ──────────────────────────────────────────────────

    #[test]
    fn merged_is_strictly_ascending(primary in arb_primary(), gap_fill in arb_gap_fill()) {
        let merged = merge(&primary, &gap_fill).unwrap();
        for w in merged.windows(2) {
            prop_assert!(w[0].timestamp < w[1].timestamp);
        }
    }

    // ── 2. Precedence ────────────────────────────────────────────────

    #[test]
    fn primary_records_survive_unchanged(primary in arb_primary(), gap_fill in arb_gap_fill()) {
        let merged = merge(&primary, &gap_fill).unwrap();
        for p in &primary {
            let found = merged.iter().find(|m| m.timestamp == p.timestamp);
            prop_assert_eq!(found, Some(p));
        }
    }

    // ── 3. Coverage ──────────────────────────────────────────────────

    #[test]
    fn merged_keys_are_the_union(primary in arb_primary(), gap_fill in arb_gap_fill()) {
        let merged = merge(&primary, &gap_fill).unwrap();
        let expected: BTreeSet<i64> = keys(&primary).union(&keys(&gap_fill)).copied().collect();
        prop_assert_eq!(keys(&merged), expected);
        prop_assert_eq!(merged.len(), keys(&merged).len());
    }

    // ── 4. Idempotence ───────────────────────────────────────────────

    #[test]
    fn merge_is_idempotent(primary in arb_primary(), gap_fill in arb_gap_fill()) {
        let once = merge(&primary, &gap_fill).unwrap();
        let twice = merge(&once, &gap_fill).unwrap();
        prop_assert_eq!(once, twice);
    }

    // ── 5. Truncation ────────────────────────────────────────────────

    #[test]
    fn truncated_prefix_is_evenly_spaced(primary in arb_primary(), gap_fill in arb_gap_fill()) {
        let merged = merge(&primary, &gap_fill).unwrap();
        let report = validate(&merged, MINUTE_SECS).unwrap();
        let kept = truncate_at(&merged, report.boundary);

        prop_assert!(find_gaps(kept.iter().map(|c| c.timestamp), MINUTE_SECS).is_empty());
        match report.boundary {
            Some(b) => {
                prop_assert!(kept.iter().all(|c| c.timestamp < b));
                prop_assert!(merged.iter().any(|c| c.timestamp == b));
            }
            None => prop_assert_eq!(kept.len(), merged.len()),
        }
    }
}
