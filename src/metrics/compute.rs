use super::types::{AbsenceTotals, MetricValue, OvertimeTotals};

/// Divide only by a positive denominator.
fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Headcount snapshot. Never null.
pub fn headcount(active: u64) -> MetricValue {
    let v = active as f64;
    MetricValue {
        value: Some(v),
        numerator: Some(v),
        denominator: None,
    }
}

/// `(paid + unpaid absence) / scheduled`. Not clamped to `[0, 1]`.
pub fn absenteeism_rate(totals: AbsenceTotals) -> MetricValue {
    MetricValue {
        value: ratio(totals.absent_minutes, totals.scheduled_minutes),
        numerator: Some(totals.absent_minutes),
        denominator: Some(totals.scheduled_minutes),
    }
}

/// `overtime / worked`. Not clamped.
pub fn overtime_rate(totals: OvertimeTotals) -> MetricValue {
    MetricValue {
        value: ratio(totals.overtime_minutes, totals.worked_minutes),
        numerator: Some(totals.overtime_minutes),
        denominator: Some(totals.worked_minutes),
    }
}

/// Mean of per-day headcount snapshots; zero for an empty series.
pub fn average_headcount(daily: &[u64]) -> f64 {
    if daily.is_empty() {
        return 0.0;
    }
    daily.iter().map(|&n| n as f64).sum::<f64>() / daily.len() as f64
}

/// `terminations / average daily headcount`.
pub fn turnover_rate(terminations: u64, daily_headcounts: &[u64]) -> MetricValue {
    let avg = average_headcount(daily_headcounts);
    let terms = terminations as f64;
    MetricValue {
        value: ratio(terms, avg),
        numerator: Some(terms),
        denominator: Some(avg),
    }
}
