pub mod date_util;
pub mod error;
pub mod facts;
pub mod ingest;
pub mod metrics;
pub mod period;
pub mod settings;
pub mod source;
pub mod storage;

pub use error::{Error, Result};
pub use facts::{EmployeeFact, TimeEntryFact};
pub use ingest::ImportReport;
pub use metrics::{
    definitions, BucketStatus, Cadence, Engine, HealthStatus, MetricConfig, MetricDefinition,
    MetricKey, MetricPoint, Thresholds, TrendBucket, TrendRequest,
};
pub use period::{Period, PeriodSpec};
pub use settings::Settings;
pub use source::{ConfigSource, FactSource, MemorySource, RetryPolicy, Retrying};
pub use storage::Database;

// Re-export repository row types needed by the binary crate, but not the module itself
pub use storage::repository::{HeadcountBreakdown, HistoryEntry, StoreCounts};

use chrono::NaiveDate;
use futures::future::try_join_all;

use metrics::trend::validate_company;
use settings::{parse_company_id, CONFIG_DEFAULT_COMPANY};
use storage::repository;

/// Company used when nothing else names one.
pub const FALLBACK_COMPANY_ID: i64 = 1;

/// Main entry point: a fact store plus the settings it was opened with.
/// Every computation reads through a retrying accessor.
pub struct Hrkpi {
    db: Database,
    source: Retrying<Database>,
    settings: Settings,
}

impl Hrkpi {
    pub fn new(db: Database, settings: Settings) -> Self {
        let source = Retrying::new(db.clone(), settings.retry.clone());
        Self {
            db,
            source,
            settings,
        }
    }

    /// Open the store named by `settings`.
    pub async fn open(settings: Settings) -> Result<Self> {
        let db = Database::open_at(settings.db_path()?).await?;
        Ok(Self::new(db, settings))
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> Engine<'_> {
        Engine::new(&self.source, &self.source)
    }

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    /// Pick the company a command runs against: `explicit` (the `--company`
    /// flag), then the stored `default_company_id` key, then
    /// `HRKPI_COMPANY_ID`, then company 1.
    pub async fn resolve_company(&self, explicit: Option<i64>) -> Result<i64> {
        if let Some(id) = explicit {
            validate_company(id)?;
            return Ok(id);
        }
        let stored = self
            .config_get(CONFIG_DEFAULT_COMPANY)
            .await?
            .filter(|v| !v.trim().is_empty());
        if let Some(raw) = stored {
            return parse_company_id(CONFIG_DEFAULT_COMPANY, &raw);
        }
        Ok(self.settings.default_company_id.unwrap_or(FALLBACK_COMPANY_ID))
    }

    // ── Metrics ────────────────────────────────────────────────────

    pub async fn compute_current(&self, company_id: i64, metric: MetricKey) -> Result<MetricPoint> {
        self.engine()
            .compute_current(company_id, metric, Self::today())
            .await
    }

    /// All four current points, in definition order.
    pub async fn compute_current_all(&self, company_id: i64) -> Result<Vec<MetricPoint>> {
        let today = Self::today();
        let engine = self.engine();
        try_join_all(
            definitions()
                .iter()
                .map(|def| engine.compute_current(company_id, def.key, today)),
        )
        .await
    }

    pub async fn compute_for_period(
        &self,
        company_id: i64,
        metric: MetricKey,
        period: Period,
    ) -> Result<MetricPoint> {
        self.engine()
            .compute_for_period(company_id, metric, period, Self::today())
            .await
    }

    pub async fn compute_trend(
        &self,
        company_id: i64,
        metric: MetricKey,
        request: TrendRequest,
    ) -> Result<Vec<TrendBucket>> {
        self.compute_trend_as_of(company_id, metric, request, Self::today())
            .await
    }

    pub async fn compute_trend_as_of(
        &self,
        company_id: i64,
        metric: MetricKey,
        request: TrendRequest,
        today: NaiveDate,
    ) -> Result<Vec<TrendBucket>> {
        self.engine()
            .compute_trend(company_id, metric, request, today)
            .await
    }

    /// Direct vs indirect labor headcount as of `as_of` (today when `None`).
    pub async fn headcount_breakdown(
        &self,
        company_id: i64,
        as_of: Option<NaiveDate>,
    ) -> Result<HeadcountBreakdown> {
        validate_company(company_id)?;
        let as_of = as_of.unwrap_or_else(Self::today);
        Ok(self
            .db
            .reader()
            .call(move |conn| repository::headcount_breakdown(conn, company_id, as_of))
            .await?)
    }

    // ── History ────────────────────────────────────────────────────

    /// Persist a computed point. Returns `false` when the point has no value.
    pub async fn record_history(&self, company_id: i64, point: &MetricPoint) -> Result<bool> {
        let point = point.clone();
        Ok(self
            .db
            .writer()
            .call(move |conn| repository::write_metric_history(conn, company_id, &point))
            .await?)
    }

    pub async fn history(&self, company_id: i64, metric: MetricKey) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .db
            .reader()
            .call(move |conn| repository::list_metric_history(conn, company_id, metric))
            .await?)
    }

    // ── Import ─────────────────────────────────────────────────────

    pub async fn import_employees(&self, company_id: i64, json: &str) -> Result<ImportReport> {
        validate_company(company_id)?;
        let records = ingest::parse_records(json)?;
        let (facts, report) =
            ingest::normalize_batch(&records, |r| ingest::normalize_employee(company_id, r));
        self.db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                for fact in &facts {
                    repository::upsert_employee(&tx, fact)?;
                }
                tx.commit()?;
                Ok::<(), rusqlite::Error>(())
            })
            .await?;
        log::info!(
            "imported {} employees for company {company_id} ({} rejected)",
            report.imported,
            report.rejected
        );
        Ok(report)
    }

    pub async fn import_time_entries(&self, company_id: i64, json: &str) -> Result<ImportReport> {
        validate_company(company_id)?;
        let records = ingest::parse_records(json)?;
        let (facts, report) =
            ingest::normalize_batch(&records, |r| ingest::normalize_time_entry(company_id, r));
        self.db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                for fact in &facts {
                    repository::upsert_time_entry(&tx, fact)?;
                }
                tx.commit()?;
                Ok::<(), rusqlite::Error>(())
            })
            .await?;
        log::info!(
            "imported {} time entries for company {company_id} ({} rejected)",
            report.imported,
            report.rejected
        );
        Ok(report)
    }

    // ── Thresholds ─────────────────────────────────────────────────

    /// Store a new time-effective config record. Existing records are never
    /// modified; overlaps resolve to the latest `effective_from`.
    pub async fn set_metric_config(&self, config: MetricConfig) -> Result<i64> {
        validate_company(config.company_id)?;
        if config.effective_to.is_some_and(|to| to < config.effective_from) {
            return Err(Error::InvalidPeriod(format!(
                "effective_to {} is before effective_from {}",
                config.effective_to.map(|d| d.to_string()).unwrap_or_default(),
                config.effective_from
            )));
        }
        Ok(self
            .db
            .writer()
            .call(move |conn| repository::insert_metric_config(conn, &config))
            .await?)
    }

    pub async fn metric_configs(
        &self,
        company_id: i64,
        metric: Option<MetricKey>,
    ) -> Result<Vec<MetricConfig>> {
        Ok(self
            .db
            .reader()
            .call(move |conn| repository::list_metric_configs(conn, company_id, metric))
            .await?)
    }

    // ── Status ─────────────────────────────────────────────────────

    pub async fn store_counts(&self) -> Result<StoreCounts> {
        Ok(self.db.reader().call(|conn| repository::store_counts(conn)).await?)
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        Ok(self
            .db
            .reader()
            .call(move |conn| repository::get_config(conn, &key))
            .await?)
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        Ok(self
            .db
            .writer()
            .call(move |conn| repository::set_config(conn, &key, &value))
            .await?)
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        Ok(self.db.reader().call(|conn| repository::list_config(conn)).await?)
    }
}
