use chrono::{Datelike, Duration, NaiveDate};

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap() - Duration::days(1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap() - Duration::days(1)
    }
}

/// First day of the month containing `d`.
pub fn month_start(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.day0() as i64)
}

/// Calendar bounds `(first, last)` of the month containing `d`.
/// The last day is the next month's first day minus one day.
pub fn month_bounds(d: NaiveDate) -> (NaiveDate, NaiveDate) {
    (month_start(d), last_day_of_month(d.year(), d.month()))
}

/// First day of the month before the one containing `d`, wrapping
/// January back to December of the prior year.
pub fn previous_month_start(d: NaiveDate) -> NaiveDate {
    month_start(month_start(d) - Duration::days(1))
}

/// Monday..Sunday bounds of the week containing `d`.
pub fn week_bounds(d: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = d - Duration::days(d.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(6))
}

/// Monday..Sunday bounds of the most recent week ending on a Sunday at or
/// before `d`.
pub fn week_bounds_ending(d: NaiveDate) -> (NaiveDate, NaiveDate) {
    let since_sunday = (d.weekday().num_days_from_sunday()) as i64;
    let end = d - Duration::days(since_sunday);
    (end - Duration::days(6), end)
}

/// Number of calendar days in `[start, end]`; zero when `end < start`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2025, 1), d(2025, 1, 31));
        assert_eq!(last_day_of_month(2025, 2), d(2025, 2, 28));
        assert_eq!(last_day_of_month(2024, 2), d(2024, 2, 29)); // Leap year
        assert_eq!(last_day_of_month(2025, 12), d(2025, 12, 31));
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(d(2024, 2, 17)), (d(2024, 2, 1), d(2024, 2, 29)));
        assert_eq!(month_bounds(d(2025, 12, 1)), (d(2025, 12, 1), d(2025, 12, 31)));
    }

    #[test]
    fn test_previous_month_start_wraps_year() {
        assert_eq!(previous_month_start(d(2025, 1, 15)), d(2024, 12, 1));
        assert_eq!(previous_month_start(d(2025, 3, 31)), d(2025, 2, 1));
    }

    #[test]
    fn test_week_bounds() {
        // 2024-06-12 is a Wednesday
        let (s, e) = week_bounds(d(2024, 6, 12));
        assert_eq!(s, d(2024, 6, 10));
        assert_eq!(e, d(2024, 6, 16));
        assert_eq!(s.weekday(), Weekday::Mon);
        assert_eq!(e.weekday(), Weekday::Sun);
    }

    #[test]
    fn test_week_bounds_ending() {
        // Wednesday -> previous Sunday
        assert_eq!(week_bounds_ending(d(2024, 6, 12)), (d(2024, 6, 3), d(2024, 6, 9)));
        // Sunday -> itself
        assert_eq!(week_bounds_ending(d(2024, 6, 16)), (d(2024, 6, 10), d(2024, 6, 16)));
        // Monday -> day before
        assert_eq!(week_bounds_ending(d(2024, 6, 17)), (d(2024, 6, 10), d(2024, 6, 16)));
    }

    #[test]
    fn test_days_inclusive() {
        assert_eq!(days_inclusive(d(2024, 1, 1), d(2024, 1, 1)), 1);
        assert_eq!(days_inclusive(d(2024, 1, 1), d(2024, 1, 31)), 31);
        assert_eq!(days_inclusive(d(2024, 1, 2), d(2024, 1, 1)), 0);
    }
}
