use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::facts::{EmployeeFact, TimeEntryFact};

/// Outcome of normalizing one batch of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub rejected: usize,
    pub errors: Vec<String>,
}

/// Parse a JSON payload into records. Accepts a bare array or an object
/// wrapping one under `data`, `employees`, `timecards` or `entries`.
pub fn parse_records(json: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => ["data", "employees", "timecards", "entries"]
            .iter()
            .find_map(|k| match obj.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| Error::Ingest("expected an array of records".into())),
        _ => Err(Error::Ingest("expected an array of records".into())),
    }
}

/// Normalize every record with `f`, collecting rejections instead of failing.
pub fn normalize_batch<T>(
    records: &[Value],
    mut f: impl FnMut(&Value) -> Result<T>,
) -> (Vec<T>, ImportReport) {
    let mut facts = Vec::with_capacity(records.len());
    let mut report = ImportReport::default();
    for (i, record) in records.iter().enumerate() {
        match f(record) {
            Ok(fact) => {
                facts.push(fact);
                report.imported += 1;
            }
            Err(e) => {
                log::warn!("record {i} rejected: {e}");
                report.rejected += 1;
                report.errors.push(format!("record {i}: {e}"));
            }
        }
    }
    (facts, report)
}

/// Map a provider employee record onto [`EmployeeFact`]. Providers disagree
/// on field names (`eecode` vs `external_id`, `hiredate` vs `hire_date`), so
/// each field accepts its known aliases.
pub fn normalize_employee(company_id: i64, record: &Value) -> Result<EmployeeFact> {
    let external_id = text(record, &["external_id", "eecode", "id", "employee_id"])
        .ok_or_else(|| Error::Ingest("employee without an identifier".into()))?;
    let hire_date = date(record, &["hire_date", "hiredate"])?
        .ok_or_else(|| Error::Ingest(format!("employee {external_id} without a hire date")))?;
    let termination_date = date(record, &["termination_date", "termdate"])?;
    if termination_date.is_some_and(|t| t < hire_date) {
        return Err(Error::Ingest(format!(
            "employee {external_id} terminated before hire date"
        )));
    }

    let reason = text(record, &["termination_reason", "termreason"]).unwrap_or_default();
    let is_transfer = flag(record, &["is_transfer", "transfer"])
        || reason.to_ascii_lowercase().contains("transfer");

    Ok(EmployeeFact {
        company_id,
        external_id,
        first_name: text(record, &["first_name", "firstname"]),
        last_name: text(record, &["last_name", "lastname"]),
        email: text(record, &["email"]),
        department: text(record, &["department", "deptname"]),
        labor_type: text(record, &["labor_type", "labortype"]).map(|t| t.to_ascii_lowercase()),
        hire_date,
        termination_date,
        is_transfer,
        is_deleted: flag(record, &["is_deleted", "deleted"]),
    })
}

pub fn normalize_time_entry(company_id: i64, record: &Value) -> Result<TimeEntryFact> {
    let employee_external_id = text(record, &["employee_external_id", "employee_id", "eecode"])
        .ok_or_else(|| Error::Ingest("time entry without an employee identifier".into()))?;
    let work_date = date(record, &["work_date", "date"])?.ok_or_else(|| {
        Error::Ingest(format!("time entry for {employee_external_id} without a work date"))
    })?;

    let worked_minutes = minutes(record, &["worked_minutes"], &["hours_worked"]).unwrap_or(0);
    let tiered = ["ot1_minutes", "ot2_minutes"]
        .iter()
        .filter_map(|k| number(record, &[*k]))
        .map(|m| m.round() as i64)
        .reduce(|a, b| a + b);
    let overtime_minutes = tiered
        .or_else(|| minutes(record, &["overtime_minutes"], &["overtime_hours"]))
        .unwrap_or(0);

    let entry = TimeEntryFact {
        company_id,
        employee_external_id,
        work_date,
        worked_minutes,
        scheduled_minutes: minutes(record, &["scheduled_minutes"], &["scheduled_hours"]),
        overtime_minutes,
        paid_absence_minutes: minutes(record, &["paid_absence_minutes", "absence_minutes"], &[])
            .unwrap_or(0),
        unpaid_absence_minutes: minutes(record, &["unpaid_absence_minutes"], &[]).unwrap_or(0),
    };
    if [
        entry.worked_minutes,
        entry.overtime_minutes,
        entry.paid_absence_minutes,
        entry.unpaid_absence_minutes,
    ]
    .iter()
    .any(|m| *m < 0)
        || entry.scheduled_minutes.is_some_and(|m| m < 0)
    {
        return Err(Error::Ingest(format!(
            "time entry for {} on {work_date} has negative minutes",
            entry.employee_external_id
        )));
    }
    Ok(entry)
}

// ── Field helpers ──────────────────────────────────────────────────

fn field<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty()))
}

fn text(record: &Value, keys: &[&str]) -> Option<String> {
    match field(record, keys)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(record: &Value, keys: &[&str]) -> Option<f64> {
    match field(record, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(record: &Value, keys: &[&str]) -> bool {
    match field(record, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1"),
        _ => false,
    }
}

/// Minutes from a minute field, falling back to decimal hours.
fn minutes(record: &Value, minute_keys: &[&str], hour_keys: &[&str]) -> Option<i64> {
    number(record, minute_keys)
        .or_else(|| number(record, hour_keys).map(|h| h * 60.0))
        .map(|m| m.round() as i64)
}

/// Accepts `YYYY-MM-DD`, ISO datetimes, and `MM/DD/YYYY`.
fn date(record: &Value, keys: &[&str]) -> Result<Option<NaiveDate>> {
    let Some(raw) = text(record, keys) else {
        return Ok(None);
    };
    parse_date(&raw)
        .map(Some)
        .ok_or_else(|| Error::Ingest(format!("unrecognized date '{raw}'")))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date()))
        .or_else(|| raw.get(..10).and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok()))
        .or_else(|| NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_employee_aliases() {
        let e = normalize_employee(
            3,
            &json!({
                "eecode": "A100",
                "firstname": "Grace",
                "lastname": "Hopper",
                "deptname": "Ops",
                "hiredate": "01/15/2023",
                "termdate": "2024-02-01T00:00:00Z",
                "termreason": "Internal Transfer"
            }),
        )
        .unwrap();
        assert_eq!(e.company_id, 3);
        assert_eq!(e.external_id, "A100");
        assert_eq!(e.first_name.as_deref(), Some("Grace"));
        assert_eq!(e.department.as_deref(), Some("Ops"));
        assert_eq!(e.labor_type, None);
        assert_eq!(e.hire_date, d(2023, 1, 15));
        assert_eq!(e.termination_date, Some(d(2024, 2, 1)));
        assert!(e.is_transfer);
        assert!(!e.is_deleted);
    }

    #[test]
    fn test_employee_labor_type_is_lowercased() {
        let e = normalize_employee(
            1,
            &json!({"eecode": "A1", "hiredate": "2024-01-01", "labortype": " Indirect "}),
        )
        .unwrap();
        assert_eq!(e.labor_type.as_deref(), Some("indirect"));
    }

    #[test]
    fn test_employee_rejections() {
        assert!(normalize_employee(1, &json!({"hire_date": "2024-01-01"})).is_err());
        assert!(normalize_employee(1, &json!({"external_id": "E1"})).is_err());
        assert!(normalize_employee(1, &json!({"external_id": "E1", "hire_date": "soon"})).is_err());
        assert!(normalize_employee(
            1,
            &json!({"external_id": "E1", "hire_date": "2024-02-01", "termination_date": "2024-01-01"})
        )
        .is_err());
    }

    #[test]
    fn test_time_entry_minutes_and_tiers() {
        let t = normalize_time_entry(
            1,
            &json!({
                "employee_id": 42,
                "work_date": "2024-06-03",
                "worked_minutes": 540,
                "ot1_minutes": 45,
                "ot2_minutes": "15",
                "scheduled_minutes": 480,
                "absence_minutes": 30,
                "unpaid_absence_minutes": 10
            }),
        )
        .unwrap();
        assert_eq!(t.employee_external_id, "42");
        assert_eq!(t.worked_minutes, 540);
        assert_eq!(t.overtime_minutes, 60);
        assert_eq!(t.scheduled_minutes, Some(480));
        assert_eq!(t.paid_absence_minutes, 30);
        assert_eq!(t.unpaid_absence_minutes, 10);
    }

    #[test]
    fn test_time_entry_hours_fallback() {
        let t = normalize_time_entry(
            1,
            &json!({"eecode": "E1", "date": "2024-06-03", "hours_worked": 8.5, "overtime_hours": 0.25}),
        )
        .unwrap();
        assert_eq!(t.worked_minutes, 510);
        assert_eq!(t.overtime_minutes, 15);
        assert_eq!(t.scheduled_minutes, None);
        assert_eq!(t.paid_absence_minutes, 0);
    }

    #[test]
    fn test_time_entry_rejects_negative_minutes() {
        let err = normalize_time_entry(
            1,
            &json!({"eecode": "E1", "work_date": "2024-06-03", "worked_minutes": -5}),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Ingest(_)));
    }

    #[test]
    fn test_batch_counts_rejections() {
        let records = parse_records(
            r#"{"data": [
                {"eecode": "E1", "hiredate": "2024-01-01"},
                {"firstname": "nobody"},
                {"eecode": "E2", "hiredate": "2024-01-02"}
            ]}"#,
        )
        .unwrap();
        let (facts, report) = normalize_batch(&records, |r| normalize_employee(1, r));
        assert_eq!(facts.len(), 2);
        assert_eq!(report.imported, 2);
        assert_eq!(report.rejected, 1);
        assert!(report.errors[0].starts_with("record 1:"));
    }

    #[test]
    fn test_parse_records_shapes() {
        assert_eq!(parse_records("[]").unwrap().len(), 0);
        assert!(matches!(parse_records("{\"x\": 1}"), Err(Error::Ingest(_))));
        assert!(matches!(parse_records("not json"), Err(Error::Ingest(_))));
    }
}
