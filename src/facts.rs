use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical employee record. Provider payloads are normalized into this
/// before they reach storage or the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeFact {
    pub company_id: i64,
    pub external_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    /// `direct` or `indirect` when the provider classifies labor; otherwise
    /// the breakdown falls back to the department.
    #[serde(default)]
    pub labor_type: Option<String>,
    pub hire_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
    /// The termination was an internal transfer, not a separation. Such
    /// terminations are excluded from turnover.
    #[serde(default)]
    pub is_transfer: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl EmployeeFact {
    pub fn new(company_id: i64, external_id: &str, hire_date: NaiveDate) -> Self {
        Self {
            company_id,
            external_id: external_id.to_string(),
            first_name: None,
            last_name: None,
            email: None,
            department: None,
            labor_type: None,
            hire_date,
            termination_date: None,
            is_transfer: false,
            is_deleted: false,
        }
    }

    pub fn terminated(mut self, on: NaiveDate) -> Self {
        self.termination_date = Some(on);
        self
    }

    pub fn transferred(mut self, on: NaiveDate) -> Self {
        self.termination_date = Some(on);
        self.is_transfer = true;
        self
    }

    pub fn is_active_on(&self, as_of: NaiveDate) -> bool {
        !self.is_deleted
            && self.hire_date <= as_of
            && self.termination_date.map_or(true, |t| t > as_of)
    }

    pub fn is_separation_within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        !self.is_deleted
            && !self.is_transfer
            && self.termination_date.is_some_and(|t| t >= start && t <= end)
    }
}

/// One employee-day of time tracking, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntryFact {
    pub company_id: i64,
    pub employee_external_id: String,
    pub work_date: NaiveDate,
    pub worked_minutes: i64,
    pub scheduled_minutes: Option<i64>,
    pub overtime_minutes: i64,
    pub paid_absence_minutes: i64,
    pub unpaid_absence_minutes: i64,
}

impl TimeEntryFact {
    pub fn absence_minutes(&self) -> i64 {
        self.paid_absence_minutes + self.unpaid_absence_minutes
    }

    pub fn has_schedule(&self) -> bool {
        self.scheduled_minutes.is_some_and(|s| s > 0)
    }
}
