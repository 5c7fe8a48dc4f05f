use chrono::NaiveDate;
use futures::future::{join_all, try_join_all};

use super::buckets::{generate, resolve_cadence, Bucket, MAX_BUCKETS};
use super::compute;
use super::status::{config_as_of, evaluate};
use super::types::{
    BucketMeta, BucketStatus, Cadence, MetricKey, MetricPoint, MetricValue, TrendBucket,
};
use crate::date_util::days_inclusive;
use crate::error::{Error, Result};
use crate::period::Period;
use crate::source::{ConfigSource, FactSource};

/// Options for a trend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendRequest {
    pub cadence: Cadence,
    /// Number of closed buckets; the cadence default applies when `None`.
    pub limit: Option<u32>,
    /// Append the current, still-open period as a partial bucket.
    pub include_partial: bool,
    /// Abort the whole request on the first accessor failure instead of
    /// marking the affected bucket as `error`.
    pub fail_fast: bool,
}

impl Default for TrendRequest {
    fn default() -> Self {
        Self {
            cadence: Cadence::Auto,
            limit: None,
            include_partial: false,
            fail_fast: false,
        }
    }
}

/// Computes metric points and trends against a pair of accessors.
pub struct Engine<'a> {
    facts: &'a dyn FactSource,
    configs: &'a dyn ConfigSource,
}

pub(crate) fn validate_company(company_id: i64) -> Result<()> {
    if company_id <= 0 {
        return Err(Error::InvalidCompany(company_id));
    }
    Ok(())
}

impl<'a> Engine<'a> {
    pub fn new(facts: &'a dyn FactSource, configs: &'a dyn ConfigSource) -> Self {
        Self { facts, configs }
    }

    /// Evaluate one metric formula over `window`. Headcount is a snapshot
    /// as of the window's end.
    pub async fn compute_value(
        &self,
        company_id: i64,
        metric: MetricKey,
        window: Period,
    ) -> Result<MetricValue> {
        Ok(match metric {
            MetricKey::Headcount => {
                compute::headcount(self.facts.count_active_as_of(company_id, window.end()).await?)
            }
            MetricKey::AbsenteeismRate => {
                compute::absenteeism_rate(self.facts.sum_absence(company_id, window).await?)
            }
            MetricKey::OvertimeRate => {
                compute::overtime_rate(self.facts.sum_overtime(company_id, window).await?)
            }
            MetricKey::TurnoverRate => {
                let terms = self
                    .facts
                    .count_terminations_in_range(company_id, window)
                    .await?;
                let daily = self.facts.daily_headcounts(company_id, window).await?;
                compute::turnover_rate(terms, &daily)
            }
        })
    }

    /// Compute a metric over an explicit period and attach its status.
    pub async fn compute_for_period(
        &self,
        company_id: i64,
        metric: MetricKey,
        period: Period,
        today: NaiveDate,
    ) -> Result<MetricPoint> {
        validate_company(company_id)?;
        let value = self.compute_value(company_id, metric, period).await?.value;
        let config = self
            .configs
            .find_effective_config(company_id, metric, config_as_of(period.start(), period.end(), today))
            .await?;
        let (target_value, thresholds) = match config {
            Some(c) => (c.target_value, c.thresholds),
            None => (None, None),
        };
        Ok(MetricPoint {
            metric_key: metric,
            value,
            status: evaluate(metric.orientation(), value, thresholds.as_ref()),
            period,
            target_value,
            thresholds,
        })
    }

    /// The metric's current value under its default window: a snapshot as
    /// of today for headcount, the trailing 7 days for ratios.
    pub async fn compute_current(
        &self,
        company_id: i64,
        metric: MetricKey,
        today: NaiveDate,
    ) -> Result<MetricPoint> {
        let period = match metric.definition().current_window_days {
            Some(days) => Period::trailing(days, today),
            None => Period::day(today),
        };
        self.compute_for_period(company_id, metric, period, today).await
    }

    /// Build the ordered bucket sequence for a trend. `today` is used for
    /// every bucket of the request.
    pub async fn compute_trend(
        &self,
        company_id: i64,
        metric: MetricKey,
        request: TrendRequest,
        today: NaiveDate,
    ) -> Result<Vec<TrendBucket>> {
        validate_company(company_id)?;
        let grain = resolve_cadence(metric, request.cadence)?;
        let count = match request.limit {
            Some(limit) if limit == 0 || limit > MAX_BUCKETS => {
                return Err(Error::InvalidLimit {
                    metric,
                    limit,
                    max: MAX_BUCKETS,
                });
            }
            Some(limit) => limit,
            None => grain.default_limit(),
        };

        let buckets = generate(grain, count, request.include_partial, today);
        log::debug!(
            "{metric} trend: {} {} buckets for company {company_id} as of {today}",
            buckets.len(),
            grain.cadence()
        );

        let mut out = if request.fail_fast {
            try_join_all(
                buckets
                    .iter()
                    .map(|b| self.assemble_bucket(company_id, metric, *b, today)),
            )
            .await?
        } else {
            join_all(buckets.iter().map(|b| async move {
                self.assemble_bucket(company_id, metric, *b, today)
                    .await
                    .unwrap_or_else(|e| {
                        log::warn!("{metric} bucket {}..{} failed: {e}", b.start, b.end);
                        error_bucket(metric, b, &e, today)
                    })
            }))
            .await
        };

        out.sort_by_key(|b| b.bucket_start);
        Ok(out)
    }

    async fn assemble_bucket(
        &self,
        company_id: i64,
        metric: MetricKey,
        bucket: Bucket,
        today: NaiveDate,
    ) -> Result<TrendBucket> {
        let calendar = Period::new(bucket.start, bucket.end)?;
        // Data exists only through today; future days never dilute a value.
        let window = calendar.clamp_end(today);
        let computed = self
            .compute_value(company_id, metric, window)
            .await
            .map_err(|e| accessor_error(metric, &bucket, e))?;

        let not_applicable =
            computed.denominator.is_some_and(|d| d <= 0.0) || computed.value.is_none();
        let status = if not_applicable {
            BucketStatus::Na
        } else if bucket.is_partial {
            BucketStatus::Partial
        } else {
            BucketStatus::Ok
        };
        let value = if not_applicable { None } else { computed.value };

        let config = self
            .configs
            .find_effective_config(company_id, metric, config_as_of(bucket.start, bucket.end, today))
            .await
            .map_err(|e| accessor_error(metric, &bucket, e))?;
        let (target_value, thresholds) = match config {
            Some(c) => (c.target_value, c.thresholds),
            None => (None, None),
        };

        log::debug!(
            "{metric} {}..{}: value={value:?} status={}",
            bucket.start,
            bucket.end,
            status.as_str()
        );

        Ok(TrendBucket {
            metric_key: metric,
            bucket_start: bucket.start,
            bucket_end: bucket.end,
            value,
            numerator: computed.numerator,
            denominator: computed.denominator,
            status,
            health: evaluate(metric.orientation(), value, thresholds.as_ref()),
            target_value,
            thresholds,
            error: None,
            meta: bucket_meta(&bucket, today),
        })
    }
}

fn bucket_meta(bucket: &Bucket, today: NaiveDate) -> BucketMeta {
    let days_expected = days_inclusive(bucket.start, bucket.end);
    let days_with_data = if bucket.is_partial {
        days_inclusive(bucket.start, bucket.end.min(today)).min(days_expected)
    } else {
        days_expected
    };
    let coverage_pct = if days_expected > 0 {
        days_with_data as f64 / days_expected as f64
    } else {
        0.0
    };
    BucketMeta {
        days_expected,
        days_with_data,
        coverage_pct,
        notes: if bucket.is_partial {
            "partial period".to_string()
        } else {
            "full period".to_string()
        },
    }
}

fn accessor_error(metric: MetricKey, bucket: &Bucket, e: Error) -> Error {
    if e.is_user_error() {
        return e;
    }
    Error::Accessor {
        metric,
        start: bucket.start,
        end: bucket.end,
        message: e.to_string(),
    }
}

fn error_bucket(metric: MetricKey, bucket: &Bucket, e: &Error, today: NaiveDate) -> TrendBucket {
    let mut meta = bucket_meta(bucket, today);
    meta.notes = "accessor failure".to_string();
    TrendBucket {
        metric_key: metric,
        bucket_start: bucket.start,
        bucket_end: bucket.end,
        value: None,
        numerator: None,
        denominator: None,
        status: BucketStatus::Error,
        health: None,
        target_value: None,
        thresholds: None,
        error: Some(e.to_string()),
        meta,
    }
}
