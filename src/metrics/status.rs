use chrono::NaiveDate;

use super::types::{HealthStatus, MetricConfig, Orientation, Thresholds};

/// Map a value onto a red/yellow/green tier.
///
/// Bands are checked green, then yellow, defaulting to red. A missing
/// boundary makes its band unreachable. Thresholds are not validated for
/// monotonicity. Returns `None` when the value or thresholds are absent,
/// or the value is not finite.
pub fn evaluate(
    orientation: Orientation,
    value: Option<f64>,
    thresholds: Option<&Thresholds>,
) -> Option<HealthStatus> {
    let value = value.filter(|v| v.is_finite())?;
    let thresholds = thresholds.filter(|t| !t.is_empty())?;

    let within = |boundary: Option<f64>| -> bool {
        match (orientation, boundary) {
            (Orientation::LowerIsBetter, Some(b)) => value <= b,
            (Orientation::HigherIsBetter, Some(b)) => value >= b,
            (_, None) => false,
        }
    };

    if within(thresholds.green) {
        Some(HealthStatus::Green)
    } else if within(thresholds.yellow) {
        Some(HealthStatus::Yellow)
    } else {
        Some(HealthStatus::Red)
    }
}

/// Pick the config effective on `as_of`: the most recently started row whose
/// range contains the date.
pub fn resolve_effective(configs: &[MetricConfig], as_of: NaiveDate) -> Option<&MetricConfig> {
    configs
        .iter()
        .filter(|c| c.is_effective_on(as_of))
        .max_by_key(|c| c.effective_from)
}

/// The as-of date used to look up config for a bucket: its end date, or its
/// start date when the end lies after `today`.
pub fn config_as_of(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> NaiveDate {
    if end > today {
        start
    } else {
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricKey;

    fn thresholds(red: f64, yellow: f64, green: f64) -> Thresholds {
        Thresholds {
            red: Some(red),
            yellow: Some(yellow),
            green: Some(green),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_lower_is_better_bands() {
        let t = thresholds(0.08, 0.05, 0.03);
        let lower = Orientation::LowerIsBetter;
        assert_eq!(evaluate(lower, Some(0.025), Some(&t)), Some(HealthStatus::Green));
        assert_eq!(evaluate(lower, Some(0.03), Some(&t)), Some(HealthStatus::Green));
        assert_eq!(evaluate(lower, Some(0.06), Some(&t)), Some(HealthStatus::Yellow));
        assert_eq!(evaluate(lower, Some(0.12), Some(&t)), Some(HealthStatus::Red));
    }

    #[test]
    fn test_higher_is_better_bands() {
        let t = thresholds(8.0, 12.0, 15.0);
        let higher = Orientation::HigherIsBetter;
        assert_eq!(evaluate(higher, Some(15.0), Some(&t)), Some(HealthStatus::Green));
        assert_eq!(evaluate(higher, Some(13.0), Some(&t)), Some(HealthStatus::Yellow));
        assert_eq!(evaluate(higher, Some(3.0), Some(&t)), Some(HealthStatus::Red));
    }

    #[test]
    fn test_undecidable_without_value_or_thresholds() {
        let t = thresholds(0.08, 0.05, 0.03);
        assert_eq!(evaluate(Orientation::LowerIsBetter, None, Some(&t)), None);
        assert_eq!(evaluate(Orientation::LowerIsBetter, Some(0.01), None), None);
        assert_eq!(
            evaluate(Orientation::LowerIsBetter, Some(0.01), Some(&Thresholds::default())),
            None
        );
        assert_eq!(evaluate(Orientation::LowerIsBetter, Some(f64::NAN), Some(&t)), None);
    }

    #[test]
    fn test_missing_yellow_falls_through_to_red() {
        let t = Thresholds {
            red: Some(0.08),
            yellow: None,
            green: Some(0.03),
        };
        assert_eq!(
            evaluate(Orientation::LowerIsBetter, Some(0.04), Some(&t)),
            Some(HealthStatus::Red)
        );
    }

    #[test]
    fn test_zero_value_is_decidable() {
        let t = thresholds(0.08, 0.05, 0.03);
        assert_eq!(
            evaluate(Orientation::LowerIsBetter, Some(0.0), Some(&t)),
            Some(HealthStatus::Green)
        );
    }

    fn config(from: NaiveDate, to: Option<NaiveDate>, target: f64) -> MetricConfig {
        MetricConfig {
            company_id: 1,
            metric_key: MetricKey::AbsenteeismRate,
            target_value: Some(target),
            thresholds: None,
            effective_from: from,
            effective_to: to,
        }
    }

    #[test]
    fn test_resolve_picks_latest_started() {
        let configs = vec![
            config(d(2024, 1, 1), None, 0.03),
            config(d(2024, 3, 1), None, 0.04),
            config(d(2024, 5, 1), Some(d(2024, 5, 31)), 0.05),
        ];
        let at = |day| resolve_effective(&configs, day).and_then(|c| c.target_value);
        assert_eq!(at(d(2023, 12, 31)), None);
        assert_eq!(at(d(2024, 2, 15)), Some(0.03));
        assert_eq!(at(d(2024, 4, 15)), Some(0.04));
        assert_eq!(at(d(2024, 5, 15)), Some(0.05));
        // Bounded row expired; falls back to the open-ended March row.
        assert_eq!(at(d(2024, 6, 1)), Some(0.04));
    }

    #[test]
    fn test_config_as_of() {
        let today = d(2024, 6, 12);
        assert_eq!(config_as_of(d(2024, 5, 1), d(2024, 5, 31), today), d(2024, 5, 31));
        assert_eq!(config_as_of(d(2024, 6, 1), d(2024, 6, 30), today), d(2024, 6, 1));
        assert_eq!(config_as_of(d(2024, 6, 12), d(2024, 6, 12), today), d(2024, 6, 12));
    }
}
