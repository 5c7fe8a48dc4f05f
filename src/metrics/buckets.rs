use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::types::{Cadence, MetricKey};
use crate::date_util::{month_bounds, previous_month_start, week_bounds, week_bounds_ending};
use crate::error::{Error, Result};

/// Largest number of closed buckets a single trend may request.
pub const MAX_BUCKETS: u32 = 365;

/// A concrete bucketing granularity (cadence with `auto` resolved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grain {
    Day,
    Week,
    Month,
}

impl Grain {
    /// Number of closed buckets returned when the caller gives no limit.
    pub fn default_limit(&self) -> u32 {
        match self {
            Grain::Day => 90,
            Grain::Week => 13,
            Grain::Month => 12,
        }
    }

    pub fn cadence(&self) -> Cadence {
        match self {
            Grain::Day => Cadence::Day,
            Grain::Week => Cadence::Week,
            Grain::Month => Cadence::Month,
        }
    }

    /// The calendar bucket containing `d`.
    fn containing(&self, d: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Grain::Day => (d, d),
            Grain::Week => week_bounds(d),
            Grain::Month => month_bounds(d),
        }
    }

    /// The bucket immediately before the one starting at `start`.
    fn before(&self, start: NaiveDate) -> (NaiveDate, NaiveDate) {
        self.containing(start - Duration::days(1))
    }

    /// The most recent bucket treated as closed.
    fn last_closed(&self, today: NaiveDate, include_partial: bool) -> (NaiveDate, NaiveDate) {
        match self {
            Grain::Day => {
                if include_partial {
                    self.before(today)
                } else {
                    (today, today)
                }
            }
            Grain::Week => {
                let (start, end) = week_bounds_ending(today);
                if include_partial && end == today {
                    self.before(start)
                } else {
                    (start, end)
                }
            }
            Grain::Month => month_bounds(previous_month_start(today)),
        }
    }
}

/// Resolve a requested cadence for a metric, rejecting unsupported pairs.
pub fn resolve_cadence(metric: MetricKey, cadence: Cadence) -> Result<Grain> {
    let def = metric.definition();
    let effective = match cadence {
        Cadence::Auto => def.default_cadence,
        other => other,
    };
    if !def.supports(effective) {
        return Err(Error::InvalidCadence {
            metric,
            cadence,
            supported: def.supported_cadences(),
        });
    }
    Ok(match effective {
        Cadence::Day => Grain::Day,
        Cadence::Week => Grain::Week,
        Cadence::Month | Cadence::Auto => Grain::Month,
    })
}

/// One calendar bucket. Partial buckets cover the whole current period even
/// though data only exists through today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub is_partial: bool,
}

/// Produce `count` contiguous closed buckets ending at the last closed
/// period, in chronological order, plus one trailing partial bucket for the
/// current period when `include_partial` is set.
pub fn generate(grain: Grain, count: u32, include_partial: bool, today: NaiveDate) -> Vec<Bucket> {
    let mut buckets = Vec::with_capacity(count as usize + 1);
    let (mut start, mut end) = grain.last_closed(today, include_partial);
    for _ in 0..count {
        buckets.push(Bucket {
            start,
            end,
            is_partial: false,
        });
        (start, end) = grain.before(start);
    }
    buckets.reverse();

    if include_partial {
        let (start, end) = grain.containing(today);
        let overlaps = buckets.last().is_some_and(|b| b.end >= start);
        if !overlaps {
            buckets.push(Bucket {
                start,
                end,
                is_partial: true,
            });
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn assert_contiguous(buckets: &[Bucket]) {
        for pair in buckets.windows(2) {
            if pair[0].is_partial || pair[1].is_partial {
                continue;
            }
            assert_eq!(pair[0].end + Duration::days(1), pair[1].start, "{pair:?}");
        }
    }

    #[test]
    fn test_resolve_auto_cadence() {
        assert_eq!(resolve_cadence(MetricKey::Headcount, Cadence::Auto).unwrap(), Grain::Day);
        assert_eq!(resolve_cadence(MetricKey::AbsenteeismRate, Cadence::Auto).unwrap(), Grain::Week);
        assert_eq!(resolve_cadence(MetricKey::OvertimeRate, Cadence::Auto).unwrap(), Grain::Week);
        assert_eq!(resolve_cadence(MetricKey::TurnoverRate, Cadence::Auto).unwrap(), Grain::Month);
    }

    #[test]
    fn test_turnover_rejects_week_and_day() {
        for cadence in [Cadence::Week, Cadence::Day] {
            match resolve_cadence(MetricKey::TurnoverRate, cadence) {
                Err(Error::InvalidCadence { metric, cadence: c, .. }) => {
                    assert_eq!(metric, MetricKey::TurnoverRate);
                    assert_eq!(c, cadence);
                }
                other => panic!("expected InvalidCadence, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_headcount_rejects_month() {
        assert!(matches!(
            resolve_cadence(MetricKey::Headcount, Cadence::Month),
            Err(Error::InvalidCadence { .. })
        ));
    }

    #[test]
    fn test_day_buckets_without_partial_end_today() {
        let today = d(2024, 3, 2);
        let b = generate(Grain::Day, 3, false, today);
        assert_eq!(b.len(), 3);
        assert_eq!(b[0].start, d(2024, 2, 29));
        assert_eq!(b[2].end, today);
        assert!(b.iter().all(|x| !x.is_partial && x.start == x.end));
        assert_contiguous(&b);
    }

    #[test]
    fn test_day_buckets_with_partial_do_not_duplicate_today() {
        let today = d(2024, 3, 2);
        let b = generate(Grain::Day, 3, true, today);
        assert_eq!(b.len(), 4);
        assert_eq!(b[2].end, d(2024, 3, 1));
        assert_eq!(b[3], Bucket { start: today, end: today, is_partial: true });
        assert_eq!(b.iter().filter(|x| x.start == today).count(), 1);
    }

    #[test]
    fn test_week_buckets_midweek() {
        let today = d(2024, 6, 12); // Wednesday
        let b = generate(Grain::Week, 4, false, today);
        assert_eq!(b.len(), 4);
        assert_eq!(b[3].end, d(2024, 6, 9));
        assert_eq!(b[0].start, d(2024, 5, 13));
        for x in &b {
            assert_eq!(x.start.weekday(), Weekday::Mon);
            assert_eq!(x.end.weekday(), Weekday::Sun);
        }
        assert_contiguous(&b);
    }

    #[test]
    fn test_week_partial_midweek() {
        let today = d(2024, 6, 12);
        let b = generate(Grain::Week, 2, true, today);
        assert_eq!(b.len(), 3);
        assert_eq!(b[1].end, d(2024, 6, 9));
        assert_eq!(b[2], Bucket { start: d(2024, 6, 10), end: d(2024, 6, 16), is_partial: true });
    }

    #[test]
    fn test_week_on_sunday() {
        let sunday = d(2024, 6, 16);
        let closed = generate(Grain::Week, 2, false, sunday);
        assert_eq!(closed.last().unwrap().end, sunday);
        assert!(closed.iter().all(|b| !b.is_partial));

        let with_partial = generate(Grain::Week, 2, true, sunday);
        assert_eq!(with_partial.len(), 3);
        assert_eq!(with_partial[1].end, d(2024, 6, 9));
        assert_eq!(
            with_partial[2],
            Bucket { start: d(2024, 6, 10), end: sunday, is_partial: true }
        );
    }

    #[test]
    fn test_month_buckets_wrap_year() {
        let today = d(2025, 2, 10);
        let b = generate(Grain::Month, 3, false, today);
        assert_eq!(
            b.iter().map(|x| (x.start, x.end)).collect::<Vec<_>>(),
            vec![
                (d(2024, 11, 1), d(2024, 11, 30)),
                (d(2024, 12, 1), d(2024, 12, 31)),
                (d(2025, 1, 1), d(2025, 1, 31)),
            ]
        );
        assert_contiguous(&b);
    }

    #[test]
    fn test_month_last_day_still_uses_prior_month() {
        let today = d(2025, 1, 31);
        let b = generate(Grain::Month, 1, false, today);
        assert_eq!(b[0].start, d(2024, 12, 1));

        let b = generate(Grain::Month, 1, true, today);
        assert_eq!(b.len(), 2);
        assert_eq!(b[1], Bucket { start: d(2025, 1, 1), end: today, is_partial: true });
    }

    #[test]
    fn test_month_boundaries_round_trip() {
        let today = d(2024, 3, 15);
        let b = generate(Grain::Month, 24, false, today);
        assert_eq!(b.len(), 24);
        for x in &b {
            assert_eq!(month_bounds(x.start), (x.start, x.end));
            assert_eq!(month_bounds(x.end), (x.start, x.end));
        }
        assert_eq!(b[0].start, d(2022, 3, 1));
        assert_eq!(b[23].end, d(2024, 2, 29));
        assert_contiguous(&b);
    }

    #[test]
    fn test_zero_count_only_partial() {
        let today = d(2024, 6, 12);
        assert!(generate(Grain::Week, 0, false, today).is_empty());
        let b = generate(Grain::Week, 0, true, today);
        assert_eq!(b.len(), 1);
        assert!(b[0].is_partial);
    }

    #[test]
    fn test_default_limits() {
        assert_eq!(Grain::Day.default_limit(), 90);
        assert_eq!(Grain::Week.default_limit(), 13);
        assert_eq!(Grain::Month.default_limit(), 12);
    }
}
