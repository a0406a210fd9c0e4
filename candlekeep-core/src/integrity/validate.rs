//! Validator — structural checks and continuity scan over a merged sequence.

use super::IntegrityError;
use crate::domain::{Candle, Field, RawCandle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A break in the fixed time step between two neighbouring records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuityGap {
    /// Last timestamp before the break.
    pub before: i64,
    /// First timestamp after the break.
    pub after: i64,
}

impl ContinuityGap {
    /// Saturates for spans wider than `i64` can hold.
    pub fn span_secs(&self) -> i64 {
        self.after.saturating_sub(self.before)
    }

    /// Whole steps absent between the two records. Zero for a misaligned,
    /// shorter-than-step spacing.
    pub fn missing_steps(&self, step_secs: i64) -> i64 {
        (self.span_secs() / step_secs - 1).max(0)
    }

    /// Timestamps that would have to exist for the gap to close.
    pub fn missing_timestamps(&self, step_secs: i64) -> impl Iterator<Item = i64> {
        let before = self.before;
        (1..=self.missing_steps(step_secs))
            .map_while(move |i| i.checked_mul(step_secs).and_then(|d| before.checked_add(d)))
    }

    /// First and last absent timestamps, or `None` for a misaligned spacing
    /// with no whole step missing.
    pub fn missing_range(&self, step_secs: i64) -> Option<(i64, i64)> {
        (self.missing_steps(step_secs) > 0)
            .then(|| (self.before.saturating_add(step_secs), self.after.saturating_sub(step_secs)))
    }
}

impl fmt::Display for ContinuityGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({}s)", self.before, self.after, self.span_secs())
    }
}

/// Result of the continuity scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuityReport {
    pub step_secs: i64,
    /// Timestamp of the first record that does not follow its predecessor by
    /// exactly one step. Records at or after it are not publishable.
    pub boundary: Option<i64>,
    /// Every break found, in order. Diagnostic only.
    pub gaps: Vec<ContinuityGap>,
}

impl ContinuityReport {
    pub fn is_continuous(&self) -> bool {
        self.boundary.is_none()
    }

    /// Total number of absent steps across all gaps.
    pub fn missing_steps(&self) -> i64 {
        self.gaps
            .iter()
            .map(|g| g.missing_steps(self.step_secs))
            .sum()
    }
}

/// Every record must carry all five values, and volume must not be negative.
pub fn check_fields(candles: &[RawCandle]) -> Result<(), IntegrityError> {
    for c in candles {
        if let Some(field) = c.first_missing() {
            return Err(IntegrityError::MissingField {
                timestamp: c.timestamp,
                field,
            });
        }
        if let Some(volume) = c.get(Field::Volume).filter(|v| *v < 0.0) {
            return Err(IntegrityError::NegativeVolume {
                timestamp: c.timestamp,
                volume,
            });
        }
    }
    Ok(())
}

/// Timestamps must strictly increase: equal neighbours are duplicates, a
/// decrease is an ordering violation.
pub fn check_ascending(candles: &[RawCandle]) -> Result<(), IntegrityError> {
    for (i, pair) in candles.windows(2).enumerate() {
        let (prev, cur) = (pair[0].timestamp, pair[1].timestamp);
        if cur == prev {
            return Err(IntegrityError::DuplicateTimestamp { timestamp: cur });
        }
        if cur < prev {
            return Err(IntegrityError::InputOrdering {
                index: i + 1,
                previous: prev,
                timestamp: cur,
            });
        }
    }
    Ok(())
}

/// Scan ascending timestamps for spacings other than exactly `step_secs`.
pub fn find_gaps<I>(timestamps: I, step_secs: i64) -> Vec<ContinuityGap>
where
    I: IntoIterator<Item = i64>,
{
    let mut gaps = Vec::new();
    let mut prev: Option<i64> = None;
    for ts in timestamps {
        if let Some(before) = prev {
            if ts.checked_sub(before) != Some(step_secs) {
                gaps.push(ContinuityGap { before, after: ts });
            }
        }
        prev = Some(ts);
    }
    gaps
}

/// Validate a merged sequence and locate its continuity boundary.
///
/// Checks run in order: missing values, duplicate/unsorted keys, then the
/// step scan. Only the first two can fail.
pub fn validate(candles: &[RawCandle], step_secs: i64) -> Result<ContinuityReport, IntegrityError> {
    check_fields(candles)?;
    check_ascending(candles)?;

    let gaps = find_gaps(candles.iter().map(|c| c.timestamp), step_secs);
    Ok(ContinuityReport {
        step_secs,
        boundary: gaps.first().map(|g| g.after),
        gaps,
    })
}

/// Records strictly before `boundary`; the whole slice when there is none.
pub fn truncate_at(candles: &[RawCandle], boundary: Option<i64>) -> &[RawCandle] {
    match boundary {
        Some(b) => &candles[..candles.partition_point(|c| c.timestamp < b)],
        None => candles,
    }
}

/// Convert validated records into complete candles.
pub fn into_candles(candles: &[RawCandle]) -> Result<Vec<Candle>, IntegrityError> {
    candles
        .iter()
        .map(|c| {
            c.complete().ok_or(IntegrityError::MissingField {
                timestamp: c.timestamp,
                field: c.first_missing().unwrap_or(Field::Open),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MINUTE_SECS;

    fn raw(ts: i64) -> RawCandle {
        RawCandle {
            timestamp: ts,
            open: Some(1.0),
            high: Some(1.0),
            low: Some(1.0),
            close: Some(1.0),
            volume: Some(10.0),
        }
    }

    fn seq(ts: &[i64]) -> Vec<RawCandle> {
        ts.iter().copied().map(raw).collect()
    }

    #[test]
    fn continuous_sequence_has_no_boundary() {
        let report = validate(&seq(&[0, 60, 120, 180]), MINUTE_SECS).unwrap();
        assert!(report.is_continuous());
        assert!(report.gaps.is_empty());
    }

    #[test]
    fn gap_sets_boundary_and_truncates() {
        let candles = seq(&[0, 60, 240]);
        let report = validate(&candles, MINUTE_SECS).unwrap();

        assert_eq!(report.boundary, Some(240));
        assert_eq!(report.gaps, vec![ContinuityGap { before: 60, after: 240 }]);
        assert_eq!(report.gaps[0].missing_steps(MINUTE_SECS), 2);

        let kept = truncate_at(&candles, report.boundary);
        let kept: Vec<i64> = kept.iter().map(|c| c.timestamp).collect();
        assert_eq!(kept, vec![0, 60]);
    }

    #[test]
    fn all_gaps_reported_but_boundary_is_first() {
        let report = validate(&seq(&[0, 60, 240, 300, 600]), MINUTE_SECS).unwrap();
        assert_eq!(report.boundary, Some(240));
        assert_eq!(report.gaps.len(), 2);
        assert_eq!(report.missing_steps(), 2 + 4);
    }

    #[test]
    fn misaligned_spacing_is_a_break() {
        let report = validate(&seq(&[0, 60, 90, 150]), MINUTE_SECS).unwrap();
        assert_eq!(report.boundary, Some(90));
        assert_eq!(report.gaps[0].missing_steps(MINUTE_SECS), 0);
    }

    #[test]
    fn missing_field_is_fatal_and_names_column() {
        let mut candles = seq(&[0, 60, 120]);
        candles[1].close = None;

        let err = validate(&candles, MINUTE_SECS).unwrap_err();

        assert_eq!(
            err,
            IntegrityError::MissingField {
                timestamp: 60,
                field: Field::Close
            }
        );
    }

    #[test]
    fn negative_volume_is_fatal() {
        let mut candles = seq(&[0, 60]);
        candles[0].volume = Some(-1.0);
        assert!(matches!(
            validate(&candles, MINUTE_SECS),
            Err(IntegrityError::NegativeVolume { timestamp: 0, .. })
        ));
    }

    #[test]
    fn duplicate_is_rechecked() {
        let err = validate(&seq(&[0, 60, 60]), MINUTE_SECS).unwrap_err();
        assert_eq!(err, IntegrityError::DuplicateTimestamp { timestamp: 60 });
    }

    #[test]
    fn missing_timestamps_enumerates_hole() {
        let gap = ContinuityGap { before: 60, after: 240 };
        let missing: Vec<i64> = gap.missing_timestamps(MINUTE_SECS).collect();
        assert_eq!(missing, vec![120, 180]);
    }

    #[test]
    fn missing_range_spans_absent_minutes() {
        let gap = ContinuityGap { before: 60, after: 300 };
        assert_eq!(gap.missing_range(MINUTE_SECS), Some((120, 240)));
        assert_eq!(ContinuityGap { before: 60, after: 90 }.missing_range(MINUTE_SECS), None);
    }

    #[test]
    fn extreme_timestamps_are_a_gap_not_a_panic() {
        let gaps = find_gaps([i64::MIN + 1, i64::MAX - 1], MINUTE_SECS);
        assert_eq!(gaps, vec![ContinuityGap { before: i64::MIN + 1, after: i64::MAX - 1 }]);
        assert_eq!(gaps[0].span_secs(), i64::MAX);
        assert!(gaps[0].missing_timestamps(MINUTE_SECS).take(2).all(|t| t > i64::MIN + 1));
    }

    #[test]
    fn truncate_without_boundary_keeps_everything() {
        let candles = seq(&[0, 60]);
        assert_eq!(truncate_at(&candles, None).len(), 2);
    }

    #[test]
    fn into_candles_rejects_incomplete() {
        let mut candles = seq(&[0]);
        candles[0].open = Some(f64::NAN);
        assert!(into_candles(&candles).is_err());
        assert_eq!(into_candles(&seq(&[0, 60])).unwrap().len(), 2);
    }
}
