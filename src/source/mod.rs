pub mod memory;
pub mod retry;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::metrics::{AbsenceTotals, MetricConfig, MetricKey, OvertimeTotals};
use crate::period::Period;

pub use memory::MemorySource;
pub use retry::{RetryPolicy, Retrying};

/// Aggregate queries over employee and time-tracking facts. `Database`
/// implements this over SQLite and `MemorySource` in process; `Retrying`
/// wraps either with a retry policy.
#[async_trait]
pub trait FactSource: Send + Sync {
    /// Absence and scheduled minutes, restricted to rows with a positive
    /// schedule.
    async fn sum_absence(&self, company_id: i64, period: Period) -> Result<AbsenceTotals>;

    /// Overtime and worked minutes over all rows.
    async fn sum_overtime(&self, company_id: i64, period: Period) -> Result<OvertimeTotals>;

    /// Employees hired on or before `as_of` whose termination date, if any,
    /// is after `as_of`.
    async fn count_active_as_of(&self, company_id: i64, as_of: NaiveDate) -> Result<u64>;

    /// Terminations dated within the period, excluding internal transfers.
    async fn count_terminations_in_range(&self, company_id: i64, period: Period) -> Result<u64>;

    /// Headcount for every day of the period, in order.
    async fn daily_headcounts(&self, company_id: i64, period: Period) -> Result<Vec<u64>> {
        let mut counts = Vec::with_capacity(period.days() as usize);
        for day in period.iter_days() {
            counts.push(self.count_active_as_of(company_id, day).await?);
        }
        Ok(counts)
    }
}

/// Lookup of time-effective metric configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn find_effective_config(
        &self,
        company_id: i64,
        metric: MetricKey,
        as_of: NaiveDate,
    ) -> Result<Option<MetricConfig>>;
}
