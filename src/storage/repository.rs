use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::facts::{EmployeeFact, TimeEntryFact};
use crate::metrics::{AbsenceTotals, MetricConfig, MetricKey, MetricPoint, OvertimeTotals, Thresholds};
use crate::period::Period;

const DATE_FMT: &str = "%Y-%m-%d";

// ── Companies ──────────────────────────────────────────────────────

/// Insert a placeholder company row if none exists, so facts can reference it.
pub fn ensure_company(conn: &Connection, company_id: i64) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO companies (id, name) VALUES (?1, ?2)",
        params![company_id, format!("Company {company_id}")],
    )?;
    Ok(())
}

// ── Employees ──────────────────────────────────────────────────────

/// Idempotent per (company, external id).
pub fn upsert_employee(conn: &Connection, employee: &EmployeeFact) -> Result<(), rusqlite::Error> {
    ensure_company(conn, employee.company_id)?;
    conn.execute(
        "INSERT INTO employees (
            company_id, external_id, first_name, last_name, email, department,
            labor_type, hire_date, termination_date, is_transfer, is_deleted, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))
         ON CONFLICT(company_id, external_id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            email = excluded.email,
            department = excluded.department,
            labor_type = excluded.labor_type,
            hire_date = excluded.hire_date,
            termination_date = excluded.termination_date,
            is_transfer = excluded.is_transfer,
            is_deleted = excluded.is_deleted,
            updated_at = excluded.updated_at",
        params![
            employee.company_id,
            employee.external_id,
            employee.first_name,
            employee.last_name,
            employee.email,
            employee.department,
            employee.labor_type,
            day(employee.hire_date),
            employee.termination_date.map(day),
            employee.is_transfer,
            employee.is_deleted,
        ],
    )?;
    Ok(())
}

// ── Time entries ───────────────────────────────────────────────────

/// Idempotent per (company, employee, work date).
pub fn upsert_time_entry(conn: &Connection, entry: &TimeEntryFact) -> Result<(), rusqlite::Error> {
    ensure_company(conn, entry.company_id)?;
    conn.execute(
        "INSERT OR REPLACE INTO time_entries (
            company_id, employee_external_id, work_date, worked_minutes, scheduled_minutes,
            overtime_minutes, paid_absence_minutes, unpaid_absence_minutes, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))",
        params![
            entry.company_id,
            entry.employee_external_id,
            day(entry.work_date),
            entry.worked_minutes,
            entry.scheduled_minutes,
            entry.overtime_minutes,
            entry.paid_absence_minutes,
            entry.unpaid_absence_minutes,
        ],
    )?;
    Ok(())
}

// ── Fact aggregates ────────────────────────────────────────────────

/// Absence and schedule totals over rows with a positive schedule.
pub fn sum_absence(
    conn: &Connection,
    company_id: i64,
    period: Period,
) -> Result<AbsenceTotals, rusqlite::Error> {
    conn.query_row(
        "SELECT TOTAL(paid_absence_minutes + unpaid_absence_minutes), TOTAL(scheduled_minutes)
         FROM time_entries
         WHERE company_id = ?1 AND work_date BETWEEN ?2 AND ?3
           AND scheduled_minutes > 0",
        params![company_id, day(period.start()), day(period.end())],
        |row| {
            Ok(AbsenceTotals {
                absent_minutes: row.get(0)?,
                scheduled_minutes: row.get(1)?,
            })
        },
    )
}

pub fn sum_overtime(
    conn: &Connection,
    company_id: i64,
    period: Period,
) -> Result<OvertimeTotals, rusqlite::Error> {
    conn.query_row(
        "SELECT TOTAL(overtime_minutes), TOTAL(worked_minutes)
         FROM time_entries
         WHERE company_id = ?1 AND work_date BETWEEN ?2 AND ?3",
        params![company_id, day(period.start()), day(period.end())],
        |row| {
            Ok(OvertimeTotals {
                overtime_minutes: row.get(0)?,
                worked_minutes: row.get(1)?,
            })
        },
    )
}

pub fn count_active_as_of(
    conn: &Connection,
    company_id: i64,
    as_of: NaiveDate,
) -> Result<u64, rusqlite::Error> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM employees
         WHERE company_id = ?1 AND is_deleted = 0
           AND hire_date <= ?2
           AND (termination_date IS NULL OR termination_date > ?2)",
        params![company_id, day(as_of)],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Active headcount split into direct and indirect labor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeadcountBreakdown {
    pub direct: u64,
    pub indirect: u64,
}

impl HeadcountBreakdown {
    pub fn total(&self) -> u64 {
        self.direct + self.indirect
    }
}

/// Split the employees active on `as_of` by labor type. An explicit
/// `labor_type` wins; unclassified employees in Operations count as direct,
/// everyone else as indirect.
pub fn headcount_breakdown(
    conn: &Connection,
    company_id: i64,
    as_of: NaiveDate,
) -> Result<HeadcountBreakdown, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT CASE
                    WHEN labor_type IS NOT NULL THEN lower(labor_type) = 'direct'
                    ELSE department = 'Operations' COLLATE NOCASE
                END AS is_direct,
                COUNT(*)
         FROM employees
         WHERE company_id = ?1 AND is_deleted = 0
           AND hire_date <= ?2
           AND (termination_date IS NULL OR termination_date > ?2)
         GROUP BY 1",
    )?;
    let rows = stmt.query_map(params![company_id, day(as_of)], |row| {
        Ok((row.get::<_, Option<bool>>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut out = HeadcountBreakdown::default();
    for row in rows {
        match row? {
            (Some(true), n) => out.direct += n as u64,
            (_, n) => out.indirect += n as u64,
        }
    }
    Ok(out)
}

pub fn count_terminations_in_range(
    conn: &Connection,
    company_id: i64,
    period: Period,
) -> Result<u64, rusqlite::Error> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM employees
         WHERE company_id = ?1 AND is_deleted = 0 AND is_transfer = 0
           AND termination_date BETWEEN ?2 AND ?3",
        params![company_id, day(period.start()), day(period.end())],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// One headcount snapshot per day of the period, in a single query.
pub fn daily_headcounts(
    conn: &Connection,
    company_id: i64,
    period: Period,
) -> Result<Vec<u64>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE days(d) AS (
            SELECT ?2
            UNION ALL
            SELECT date(d, '+1 day') FROM days WHERE d < ?3
         )
         SELECT (
            SELECT COUNT(*) FROM employees e
            WHERE e.company_id = ?1 AND e.is_deleted = 0
              AND e.hire_date <= days.d
              AND (e.termination_date IS NULL OR e.termination_date > days.d)
         )
         FROM days ORDER BY d",
    )?;
    let rows = stmt.query_map(
        params![company_id, day(period.start()), day(period.end())],
        |row| row.get::<_, i64>(0).map(|n| n as u64),
    )?;
    rows.collect()
}

// ── Metric configs ─────────────────────────────────────────────────

pub fn insert_metric_config(conn: &Connection, config: &MetricConfig) -> Result<i64, rusqlite::Error> {
    ensure_company(conn, config.company_id)?;
    let thresholds = config
        .thresholds
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO metric_configs (
            company_id, metric_key, target_value, thresholds, effective_from, effective_to
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            config.company_id,
            config.metric_key.as_str(),
            config.target_value,
            thresholds,
            day(config.effective_from),
            config.effective_to.map(day),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const CONFIG_COLUMNS: &str =
    "company_id, metric_key, target_value, thresholds, effective_from, effective_to";

/// The record covering `as_of`; overlaps resolve to the latest `effective_from`.
pub fn find_effective_config(
    conn: &Connection,
    company_id: i64,
    metric: MetricKey,
    as_of: NaiveDate,
) -> Result<Option<MetricConfig>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {CONFIG_COLUMNS} FROM metric_configs
             WHERE company_id = ?1 AND metric_key = ?2
               AND effective_from <= ?3
               AND (effective_to IS NULL OR effective_to >= ?3)
             ORDER BY effective_from DESC, id DESC
             LIMIT 1"
        ),
        params![company_id, metric.as_str(), day(as_of)],
        config_from_row,
    )
    .optional()
}

pub fn list_metric_configs(
    conn: &Connection,
    company_id: i64,
    metric: Option<MetricKey>,
) -> Result<Vec<MetricConfig>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONFIG_COLUMNS} FROM metric_configs
         WHERE company_id = ?1 AND (?2 IS NULL OR metric_key = ?2)
         ORDER BY metric_key, effective_from, id"
    ))?;
    let rows = stmt.query_map(
        params![company_id, metric.map(|m| m.as_str())],
        config_from_row,
    )?;
    rows.collect()
}

fn config_from_row(row: &Row<'_>) -> Result<MetricConfig, rusqlite::Error> {
    let key: String = row.get(1)?;
    let metric_key = key
        .parse::<MetricKey>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let thresholds: Option<String> = row.get(3)?;
    let thresholds = thresholds
        .map(|s| serde_json::from_str::<Thresholds>(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(MetricConfig {
        company_id: row.get(0)?,
        metric_key,
        target_value: row.get(2)?,
        thresholds,
        effective_from: date_at(row, 4)?,
        effective_to: opt_date_at(row, 5)?,
    })
}

// ── Metric history ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub metric_key: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub value: f64,
    pub status: Option<String>,
    pub computed_at: String,
}

/// Upsert a computed point. Points without a value are skipped; returns
/// whether a row was written.
pub fn write_metric_history(
    conn: &Connection,
    company_id: i64,
    point: &MetricPoint,
) -> Result<bool, rusqlite::Error> {
    let Some(value) = point.value else {
        return Ok(false);
    };
    ensure_company(conn, company_id)?;
    conn.execute(
        "INSERT INTO metrics_history (company_id, metric_key, period_start, period_end, value, status, computed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
         ON CONFLICT(company_id, metric_key, period_start, period_end) DO UPDATE SET
            value = excluded.value,
            status = excluded.status,
            computed_at = excluded.computed_at",
        params![
            company_id,
            point.metric_key.as_str(),
            day(point.period.start()),
            day(point.period.end()),
            value,
            point.status.map(|s| s.as_str()),
        ],
    )?;
    Ok(true)
}

pub fn list_metric_history(
    conn: &Connection,
    company_id: i64,
    metric: MetricKey,
) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT metric_key, period_start, period_end, value, status, computed_at
         FROM metrics_history
         WHERE company_id = ?1 AND metric_key = ?2
         ORDER BY period_start, period_end",
    )?;
    let rows = stmt.query_map(params![company_id, metric.as_str()], |row| {
        Ok(HistoryEntry {
            metric_key: row.get(0)?,
            period_start: date_at(row, 1)?,
            period_end: date_at(row, 2)?,
            value: row.get(3)?,
            status: row.get(4)?,
            computed_at: row.get(5)?,
        })
    })?;
    rows.collect()
}

// ── Store summary ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub companies: i64,
    pub employees: i64,
    pub time_entries: i64,
    pub metric_configs: i64,
    pub history_rows: i64,
    pub first_work_date: Option<String>,
    pub last_work_date: Option<String>,
}

pub fn store_counts(conn: &Connection) -> Result<StoreCounts, rusqlite::Error> {
    let count = |table: &str| -> Result<i64, rusqlite::Error> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
    };
    let (first_work_date, last_work_date) = conn.query_row(
        "SELECT MIN(work_date), MAX(work_date) FROM time_entries",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(StoreCounts {
        companies: count("companies")?,
        employees: count("employees WHERE is_deleted = 0")?,
        time_entries: count("time_entries")?,
        metric_configs: count("metric_configs")?,
        history_rows: count("metrics_history")?,
        first_work_date,
        last_work_date,
    })
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Helpers ────────────────────────────────────────────────────────

fn day(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn date_at(row: &Row<'_>, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_date_at(row: &Row<'_>, idx: usize) -> Result<Option<NaiveDate>, rusqlite::Error> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FMT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
