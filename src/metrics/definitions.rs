use serde::Serialize;

use super::types::{Cadence, MetricKey, Orientation, Unit};

/// Static, read-only metadata for one metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricDefinition {
    pub key: MetricKey,
    pub name: &'static str,
    pub description: &'static str,
    pub orientation: Orientation,
    pub unit: Unit,
    /// Display unit hint, e.g. `%` for ratios.
    pub display_unit: Option<&'static str>,
    pub cadences: &'static [Cadence],
    pub default_cadence: Cadence,
    /// Trailing window used for "current" values; `None` means a single-day
    /// snapshot as of today.
    pub current_window_days: Option<u32>,
    pub formula: &'static str,
    pub numerator: Option<&'static str>,
    pub denominator: Option<&'static str>,
    pub edge_rules: &'static [&'static str],
}

impl MetricDefinition {
    pub fn supports(&self, cadence: Cadence) -> bool {
        self.cadences.contains(&cadence)
    }

    /// Comma-separated supported cadences, for error messages.
    pub fn supported_cadences(&self) -> String {
        self.cadences
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render a value for display. Ratios become percentages with one
    /// decimal, counts are rounded to integers. Absent or non-finite values
    /// yield `None`.
    pub fn format_value(&self, value: Option<f64>) -> Option<String> {
        let v = value.filter(|v| v.is_finite())?;
        Some(match self.unit {
            Unit::Ratio => format!("{:.1}%", v * 100.0),
            Unit::Count => format!("{}", v.round() as i64),
        })
    }
}

static DEFINITIONS: [MetricDefinition; 4] = [
    MetricDefinition {
        key: MetricKey::Headcount,
        name: "Headcount",
        description: "Count employees where hire_date <= D and (termination_date is null or termination_date > D).",
        orientation: Orientation::HigherIsBetter,
        unit: Unit::Count,
        display_unit: None,
        cadences: &[Cadence::Day, Cadence::Week],
        default_cadence: Cadence::Day,
        current_window_days: None,
        formula: "HC(D) = count(employees with hire_date <= D and (termination_date is null or termination_date > D))",
        numerator: None,
        denominator: None,
        edge_rules: &[
            "An employee is counted from the hire date up to the day before the termination date.",
            "Soft-deleted employees are never counted.",
        ],
    },
    MetricDefinition {
        key: MetricKey::AbsenteeismRate,
        name: "Absenteeism Rate",
        description: "Share of scheduled time not worked over a period.",
        orientation: Orientation::LowerIsBetter,
        unit: Unit::Ratio,
        display_unit: Some("%"),
        cadences: &[Cadence::Day, Cadence::Week, Cadence::Month],
        default_cadence: Cadence::Week,
        current_window_days: Some(7),
        formula: "Absenteeism = (Paid Absence Minutes + Unpaid Absence Minutes) / Scheduled Minutes",
        numerator: Some("Paid plus unpaid absence minutes on days with a positive schedule"),
        denominator: Some("Scheduled minutes on days with a positive schedule"),
        edge_rules: &[
            "If Scheduled = 0 -> NULL (N/A).",
            "Do not clamp; flag if Paid+Unpaid > Scheduled.",
        ],
    },
    MetricDefinition {
        key: MetricKey::OvertimeRate,
        name: "Overtime Rate",
        description: "Overtime minutes as a share of worked minutes over a period.",
        orientation: Orientation::LowerIsBetter,
        unit: Unit::Ratio,
        display_unit: Some("%"),
        cadences: &[Cadence::Day, Cadence::Week, Cadence::Month],
        default_cadence: Cadence::Week,
        current_window_days: Some(7),
        formula: "OT Rate = Overtime Minutes / Worked Minutes",
        numerator: Some("Overtime minutes across all overtime tiers"),
        denominator: Some("Worked minutes"),
        edge_rules: &[
            "If Worked = 0 -> NULL (N/A).",
            "Do not clamp; OT <= Worked if sources are consistent.",
        ],
    },
    MetricDefinition {
        key: MetricKey::TurnoverRate,
        name: "Turnover Rate",
        description: "Monthly separations relative to average daily headcount for the month.",
        orientation: Orientation::LowerIsBetter,
        unit: Unit::Ratio,
        display_unit: Some("%"),
        cadences: &[Cadence::Month],
        default_cadence: Cadence::Month,
        current_window_days: Some(7),
        formula: "Turnover = (# terminations in period, excluding transfers) / (Average Daily Headcount in period)",
        numerator: Some("Employees whose termination_date falls within the period, excluding internal transfers"),
        denominator: Some("Mean of daily headcount snapshots in the period"),
        edge_rules: &[
            "If average daily headcount = 0 -> NULL (N/A).",
            "Only monthly trends are meaningful; shorter windows are rejected.",
        ],
    },
];

/// All metric definitions in display order.
pub fn definitions() -> &'static [MetricDefinition] {
    &DEFINITIONS
}

impl MetricKey {
    pub fn definition(&self) -> &'static MetricDefinition {
        match self {
            MetricKey::Headcount => &DEFINITIONS[0],
            MetricKey::AbsenteeismRate => &DEFINITIONS[1],
            MetricKey::OvertimeRate => &DEFINITIONS[2],
            MetricKey::TurnoverRate => &DEFINITIONS[3],
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.definition().orientation
    }
}
