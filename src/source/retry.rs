use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;

use super::{ConfigSource, FactSource};
use crate::error::Result;
use crate::metrics::{AbsenceTotals, MetricConfig, MetricKey, OvertimeTotals};
use crate::period::Period;

/// Exponential backoff with jitter for accessor calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(extra)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(val) => return Ok(val),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let wait = self.delay_with_jitter(attempt);
                    log::warn!(
                        "{what} failed ({e}). Waiting {}ms before retry {}/{}",
                        wait.as_millis(),
                        attempt + 1,
                        self.max_attempts - 1
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wraps an accessor so every call is retried under a `RetryPolicy`.
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: FactSource> FactSource for Retrying<S> {
    async fn sum_absence(&self, company_id: i64, period: Period) -> Result<AbsenceTotals> {
        self.policy
            .run("sum_absence", || self.inner.sum_absence(company_id, period))
            .await
    }

    async fn sum_overtime(&self, company_id: i64, period: Period) -> Result<OvertimeTotals> {
        self.policy
            .run("sum_overtime", || self.inner.sum_overtime(company_id, period))
            .await
    }

    async fn count_active_as_of(&self, company_id: i64, as_of: NaiveDate) -> Result<u64> {
        self.policy
            .run("count_active_as_of", || self.inner.count_active_as_of(company_id, as_of))
            .await
    }

    async fn count_terminations_in_range(&self, company_id: i64, period: Period) -> Result<u64> {
        self.policy
            .run("count_terminations_in_range", || {
                self.inner.count_terminations_in_range(company_id, period)
            })
            .await
    }

    async fn daily_headcounts(&self, company_id: i64, period: Period) -> Result<Vec<u64>> {
        self.policy
            .run("daily_headcounts", || self.inner.daily_headcounts(company_id, period))
            .await
    }
}

#[async_trait]
impl<S: ConfigSource> ConfigSource for Retrying<S> {
    async fn find_effective_config(
        &self,
        company_id: i64,
        metric: MetricKey,
        as_of: NaiveDate,
    ) -> Result<Option<MetricConfig>> {
        self.policy
            .run("find_effective_config", || {
                self.inner.find_effective_config(company_id, metric, as_of)
            })
            .await
    }
}
