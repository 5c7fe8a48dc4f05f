use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date_util::{days_inclusive, last_day_of_month, month_start, week_bounds};
use crate::error::{Error, Result};

static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_ROLLING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,4})[dD]$").unwrap());

/// An inclusive calendar range. `start <= end` always holds, including for
/// deserialized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawPeriod> for Period {
    type Error = Error;

    fn try_from(raw: RawPeriod) -> Result<Self> {
        Period::new(raw.start, raw.end)
    }
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidPeriod(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A single-day snapshot period.
    pub fn day(d: NaiveDate) -> Self {
        Self { start: d, end: d }
    }

    /// The trailing `days` days ending on `end` (inclusive).
    pub fn trailing(days: u32, end: NaiveDate) -> Self {
        let span = days.max(1) as i64 - 1;
        Self {
            start: end - Duration::days(span),
            end,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> i64 {
        days_inclusive(self.start, self.end)
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        d >= self.start && d <= self.end
    }

    /// Clip the end to `limit`, keeping at least the start day.
    pub fn clamp_end(&self, limit: NaiveDate) -> Self {
        Self {
            start: self.start,
            end: self.end.min(limit).max(self.start),
        }
    }

    /// Every calendar day in the period, in order.
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.days()).map(move |offset| start + Duration::days(offset))
    }

    pub fn to_key(&self) -> String {
        format!(
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// A user-facing period expression, resolved against a reference date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodSpec {
    Day(NaiveDate),
    Range(NaiveDate, NaiveDate),
    Month(i32, u32),
    Week(i32, u32),
    Rolling(u32),
    MonthToDate,
    WeekToDate,
}

impl PeriodSpec {
    /// Parse a period string.
    ///
    /// Supported formats:
    /// - `2025-01-15`: a single day
    /// - `2025-01-01..2025-01-31`: explicit inclusive range
    /// - `2025-01`: month
    /// - `2025-W05`: ISO week
    /// - `30d`: rolling last N days ending today
    /// - `mtd` / `wtd`: month / week to date
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        match s.to_lowercase().as_str() {
            "mtd" => return Ok(PeriodSpec::MonthToDate),
            "wtd" => return Ok(PeriodSpec::WeekToDate),
            _ => {}
        }

        if let Some(caps) = RE_ROLLING.captures(s) {
            let n: u32 = caps[1].parse().unwrap();
            if n == 0 {
                return Err(Error::InvalidPeriod(format!("empty rolling window: {s}")));
            }
            return Ok(PeriodSpec::Rolling(n));
        }

        if let Some((a, b)) = s.split_once("..") {
            let start = parse_date(a)?;
            let end = parse_date(b)?;
            Period::new(start, end)?;
            return Ok(PeriodSpec::Range(start, end));
        }

        if let Some(caps) = RE_WEEK.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let week: u32 = caps[2].parse().unwrap();
            if (1..=53).contains(&week) {
                return Ok(PeriodSpec::Week(year, week));
            }
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let month: u32 = caps[2].parse().unwrap();
            if (1..=12).contains(&month) {
                return Ok(PeriodSpec::Month(year, month));
            }
        }

        if let Ok(d) = parse_date(s) {
            return Ok(PeriodSpec::Day(d));
        }

        Err(Error::InvalidPeriod(format!("unrecognized period: {s}")))
    }

    /// Resolve to concrete dates, treating `today` as the reference day.
    pub fn resolve(&self, today: NaiveDate) -> Result<Period> {
        match self {
            PeriodSpec::Day(d) => Ok(Period::day(*d)),
            PeriodSpec::Range(s, e) => Period::new(*s, *e),
            PeriodSpec::Month(y, m) => {
                let start = NaiveDate::from_ymd_opt(*y, *m, 1)
                    .ok_or_else(|| Error::InvalidPeriod(format!("invalid month {y}-{m:02}")))?;
                Period::new(start, last_day_of_month(*y, *m))
            }
            PeriodSpec::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, *w, Weekday::Mon)
                    .ok_or_else(|| Error::InvalidPeriod(format!("invalid week {y}-W{w:02}")))?;
                Period::new(start, start + Duration::days(6))
            }
            PeriodSpec::Rolling(n) => Ok(Period::trailing(*n, today)),
            PeriodSpec::MonthToDate => Period::new(month_start(today), today),
            PeriodSpec::WeekToDate => Period::new(week_bounds(today).0, today),
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidPeriod(format!("invalid date: {s}")))
}

/// ISO week label (`2025-W05`) for a date; used in human-readable output.
pub fn week_label(d: NaiveDate) -> String {
    let iw = d.iso_week();
    format!("{}-W{:02}", iw.year(), iw.week())
}
