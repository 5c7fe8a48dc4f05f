use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{ConfigSource, FactSource};
use crate::error::{Error, Result};
use crate::facts::{EmployeeFact, TimeEntryFact};
use crate::metrics::{resolve_effective, AbsenceTotals, MetricConfig, MetricKey, OvertimeTotals};
use crate::period::Period;

/// Facts and configs held in memory. Supports failure injection so callers
/// can exercise per-bucket error handling.
#[derive(Debug, Default)]
pub struct MemorySource {
    employees: Vec<EmployeeFact>,
    time_entries: Vec<TimeEntryFact>,
    configs: Vec<MetricConfig>,
    failing_days: HashSet<NaiveDate>,
    transient_failures: AtomicU32,
    calls: AtomicU32,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employee(mut self, employee: EmployeeFact) -> Self {
        self.employees.push(employee);
        self
    }

    pub fn with_time_entry(mut self, entry: TimeEntryFact) -> Self {
        self.time_entries.push(entry);
        self
    }

    pub fn with_config(mut self, config: MetricConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Any fact query whose range touches `day` fails.
    pub fn failing_on(mut self, day: NaiveDate) -> Self {
        self.failing_days.insert(day);
        self
    }

    /// The next `n` queries fail with a database error, then succeed.
    pub fn failing_first(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Total number of accessor calls served, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, start: NaiveDate, end: NaiveDate) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(Error::Database("database is locked".into()));
        }
        if let Some(day) = self.failing_days.iter().find(|d| **d >= start && **d <= end) {
            return Err(Error::Database(format!("fact store unavailable for {day}")));
        }
        Ok(())
    }

    fn entries_in(&self, company_id: i64, period: Period) -> impl Iterator<Item = &TimeEntryFact> {
        self.time_entries
            .iter()
            .filter(move |e| e.company_id == company_id && period.contains(e.work_date))
    }
}

#[async_trait]
impl FactSource for MemorySource {
    async fn sum_absence(&self, company_id: i64, period: Period) -> Result<AbsenceTotals> {
        self.check(period.start(), period.end())?;
        let mut totals = AbsenceTotals::default();
        for e in self.entries_in(company_id, period).filter(|e| e.has_schedule()) {
            totals.absent_minutes += e.absence_minutes() as f64;
            totals.scheduled_minutes += e.scheduled_minutes.unwrap_or(0) as f64;
        }
        Ok(totals)
    }

    async fn sum_overtime(&self, company_id: i64, period: Period) -> Result<OvertimeTotals> {
        self.check(period.start(), period.end())?;
        let mut totals = OvertimeTotals::default();
        for e in self.entries_in(company_id, period) {
            totals.overtime_minutes += e.overtime_minutes as f64;
            totals.worked_minutes += e.worked_minutes as f64;
        }
        Ok(totals)
    }

    async fn count_active_as_of(&self, company_id: i64, as_of: NaiveDate) -> Result<u64> {
        self.check(as_of, as_of)?;
        Ok(self
            .employees
            .iter()
            .filter(|e| e.company_id == company_id && e.is_active_on(as_of))
            .count() as u64)
    }

    async fn count_terminations_in_range(&self, company_id: i64, period: Period) -> Result<u64> {
        self.check(period.start(), period.end())?;
        Ok(self
            .employees
            .iter()
            .filter(|e| e.company_id == company_id && e.is_separation_within(period.start(), period.end()))
            .count() as u64)
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    async fn find_effective_config(
        &self,
        company_id: i64,
        metric: MetricKey,
        as_of: NaiveDate,
    ) -> Result<Option<MetricConfig>> {
        let candidates: Vec<MetricConfig> = self
            .configs
            .iter()
            .filter(|c| c.company_id == company_id && c.metric_key == metric)
            .cloned()
            .collect();
        Ok(resolve_effective(&candidates, as_of).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_single_employee_headcount() {
        let src = MemorySource::new().with_employee(EmployeeFact::new(1, "E1", d(2024, 1, 1)));
        assert_eq!(src.count_active_as_of(1, d(2024, 6, 15)).await.unwrap(), 1);
        assert_eq!(src.count_active_as_of(1, d(2023, 12, 31)).await.unwrap(), 0);
        assert_eq!(src.count_active_as_of(2, d(2024, 6, 15)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_default_daily_headcounts() {
        let src = MemorySource::new()
            .with_employee(EmployeeFact::new(1, "E1", d(2024, 1, 1)))
            .with_employee(EmployeeFact::new(1, "E2", d(2024, 1, 3)));
        let p = Period::new(d(2024, 1, 1), d(2024, 1, 4)).unwrap();
        assert_eq!(src.daily_headcounts(1, p).await.unwrap(), vec![1, 1, 2, 2]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let src = MemorySource::new().failing_on(d(2024, 1, 2)).failing_first(1);
        let p = Period::new(d(2024, 1, 3), d(2024, 1, 5)).unwrap();
        assert!(src.sum_overtime(1, p).await.is_err());
        assert!(src.sum_overtime(1, p).await.is_ok());
        let p = Period::new(d(2024, 1, 1), d(2024, 1, 5)).unwrap();
        assert!(src.sum_overtime(1, p).await.is_err());
        assert_eq!(src.calls(), 3);
    }
}
