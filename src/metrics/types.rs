use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::period::Period;

/// The fixed set of workforce KPIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Headcount,
    AbsenteeismRate,
    OvertimeRate,
    TurnoverRate,
}

impl MetricKey {
    pub const ALL: [MetricKey; 4] = [
        MetricKey::Headcount,
        MetricKey::AbsenteeismRate,
        MetricKey::OvertimeRate,
        MetricKey::TurnoverRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Headcount => "headcount",
            MetricKey::AbsenteeismRate => "absenteeism_rate",
            MetricKey::OvertimeRate => "overtime_rate",
            MetricKey::TurnoverRate => "turnover_rate",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| Error::UnknownMetric(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Count,
    Ratio,
}

/// Bucketing granularity for a trend. `Auto` resolves per metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Auto,
    Day,
    Week,
    Month,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Auto => "auto",
            Cadence::Day => "day",
            Cadence::Week => "week",
            Cadence::Month => "month",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Cadence::Auto),
            "day" | "daily" => Ok(Cadence::Day),
            "week" | "weekly" => Ok(Cadence::Week),
            "month" | "monthly" => Ok(Cadence::Month),
            other => Err(Error::Other(format!("unknown cadence: {other}"))),
        }
    }
}

/// Red/yellow/green health tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Red,
    Yellow,
    Green,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Red => "red",
            HealthStatus::Yellow => "yellow",
            HealthStatus::Green => "green",
        }
    }
}

/// Boundary values in the metric's own unit. A missing key makes that band
/// unreachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yellow: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green: Option<f64>,
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        self.red.is_none() && self.yellow.is_none() && self.green.is_none()
    }
}

/// A time-effective target/threshold record for one metric of one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub company_id: i64,
    pub metric_key: MetricKey,
    pub target_value: Option<f64>,
    pub thresholds: Option<Thresholds>,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl MetricConfig {
    pub fn is_effective_on(&self, as_of: NaiveDate) -> bool {
        self.effective_from <= as_of && self.effective_to.map_or(true, |to| to >= as_of)
    }
}

/// Summed absence facts over a period (rows with a positive schedule only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AbsenceTotals {
    pub absent_minutes: f64,
    pub scheduled_minutes: f64,
}

/// Summed overtime facts over a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OvertimeTotals {
    pub overtime_minutes: f64,
    pub worked_minutes: f64,
}

/// The result of evaluating one metric formula. `value` is `None` when the
/// denominator is not positive; it is never replaced by zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricValue {
    pub value: Option<f64>,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
}

/// A single metric value with its health status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub metric_key: MetricKey,
    pub value: Option<f64>,
    pub status: Option<HealthStatus>,
    pub period: Period,
    pub target_value: Option<f64>,
    pub thresholds: Option<Thresholds>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketStatus {
    Ok,
    Na,
    Partial,
    Error,
}

impl BucketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketStatus::Ok => "ok",
            BucketStatus::Na => "na",
            BucketStatus::Partial => "partial",
            BucketStatus::Error => "error",
        }
    }
}

/// Coverage metadata for a trend bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketMeta {
    pub days_expected: i64,
    pub days_with_data: i64,
    pub coverage_pct: f64,
    pub notes: String,
}

/// One fully described trend bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub metric_key: MetricKey,
    pub bucket_start: NaiveDate,
    pub bucket_end: NaiveDate,
    pub value: Option<f64>,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
    pub status: BucketStatus,
    /// Red/yellow/green tier against the effective config, when decidable.
    pub health: Option<HealthStatus>,
    pub target_value: Option<f64>,
    pub thresholds: Option<Thresholds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub meta: BucketMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_key_round_trip_str() {
        for key in MetricKey::ALL {
            assert_eq!(key.as_str().parse::<MetricKey>().unwrap(), key);
        }
        assert!("attrition".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_metric_key_serde_snake_case() {
        let json = serde_json::to_string(&MetricKey::AbsenteeismRate).unwrap();
        assert_eq!(json, "\"absenteeism_rate\"");
    }

    #[test]
    fn test_cadence_parse() {
        assert_eq!("week".parse::<Cadence>().unwrap(), Cadence::Week);
        assert_eq!("Monthly".parse::<Cadence>().unwrap(), Cadence::Month);
        assert!("quarter".parse::<Cadence>().is_err());
    }

    #[test]
    fn test_thresholds_partial_json() {
        let t: Thresholds = serde_json::from_str(r#"{"red":0.08,"green":0.03}"#).unwrap();
        assert_eq!(t.red, Some(0.08));
        assert_eq!(t.yellow, None);
        assert_eq!(t.green, Some(0.03));
        assert!(!t.is_empty());
        assert!(Thresholds::default().is_empty());
    }

    #[test]
    fn test_config_effective_range() {
        let cfg = MetricConfig {
            company_id: 1,
            metric_key: MetricKey::OvertimeRate,
            target_value: None,
            thresholds: None,
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            effective_to: NaiveDate::from_ymd_opt(2024, 6, 30),
        };
        assert!(!cfg.is_effective_on(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));
        assert!(cfg.is_effective_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(cfg.is_effective_on(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
        assert!(!cfg.is_effective_on(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));
    }
}
