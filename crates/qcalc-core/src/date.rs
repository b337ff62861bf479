use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::{CalcError, CalcResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateDuration {
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub total_days: i64,
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

/// Calendar difference between two dates. Day shortfalls borrow the length
/// of the month before `end`'s month. `None` when `end` precedes `start`.
pub fn duration(start: NaiveDate, end: NaiveDate) -> Option<DateDuration> {
    if end < start {
        return None;
    }
    let mut years = end.year() - start.year();
    let mut months = end.month() as i32 - start.month() as i32;
    let mut days = end.day() as i32 - start.day() as i32;
    if days < 0 {
        months -= 1;
        let (py, pm) = if end.month() == 1 {
            (end.year() - 1, 12)
        } else {
            (end.year(), end.month() - 1)
        };
        days += days_in_month(py, pm) as i32;
    }
    if months < 0 {
        years -= 1;
        months += 12;
    }
    Some(DateDuration {
        years,
        months,
        days,
        total_days: (end - start).num_days(),
    })
}

/// Build a date from a possibly out-of-range month index and day, rolling
/// the excess forward the way calendar setters do (Feb 30 → Mar 1/2).
fn rolled(year: i32, month0: i64, day: u32) -> Option<NaiveDate> {
    let year = year as i64 + month0.div_euclid(12);
    let month = month0.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)?;
    first.checked_add_signed(Duration::days(day as i64 - 1))
}

/// Shift `base` by years, then months, then days. A day of month that does
/// not exist after a shift overflows into the following month.
pub fn add_to_date(base: NaiveDate, years: i32, months: i32, days: i64) -> CalcResult<NaiveDate> {
    let out_of_range = || CalcError::OutOfRange("resulting date".into());
    let shifted_year = base
        .year()
        .checked_add(years)
        .ok_or_else(out_of_range)?;
    let after_years = rolled(shifted_year, base.month0() as i64, base.day()).ok_or_else(out_of_range)?;
    let after_months = rolled(
        after_years.year(),
        after_years.month0() as i64 + months as i64,
        after_years.day(),
    )
    .ok_or_else(out_of_range)?;
    let delta = Duration::try_days(days).ok_or_else(out_of_range)?;
    after_months
        .checked_add_signed(delta)
        .ok_or_else(out_of_range)
}

/// `Monday, January 1, 2024`.
pub fn format_long(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

pub fn parse_date(text: &str) -> CalcResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| CalcError::invalid(format!("'{}' is not a valid date (YYYY-MM-DD).", text.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_duration_simple() {
        let r = duration(d(2024, 1, 1), d(2025, 1, 1)).unwrap();
        assert_eq!((r.years, r.months, r.days), (1, 0, 0));
        assert_eq!(r.total_days, 366);
    }

    #[test]
    fn test_duration_borrows_previous_month() {
        // February 2024 has 29 days.
        let r = duration(d(2024, 1, 15), d(2024, 3, 10)).unwrap();
        assert_eq!((r.years, r.months, r.days), (0, 1, 24));
        let r = duration(d(2023, 11, 15), d(2024, 2, 10)).unwrap();
        assert_eq!((r.years, r.months, r.days), (0, 2, 26));
    }

    #[test]
    fn test_duration_end_before_start() {
        assert!(duration(d(2024, 5, 2), d(2024, 5, 1)).is_none());
        assert_eq!(duration(d(2024, 5, 1), d(2024, 5, 1)).unwrap().total_days, 0);
    }

    #[test]
    fn test_add_month_overflow() {
        assert_eq!(add_to_date(d(2024, 1, 31), 0, 1, 0).unwrap(), d(2024, 3, 2));
        assert_eq!(add_to_date(d(2023, 1, 31), 0, 1, 0).unwrap(), d(2023, 3, 3));
    }

    #[test]
    fn test_add_leap_day_year() {
        assert_eq!(add_to_date(d(2024, 2, 29), 1, 0, 0).unwrap(), d(2025, 3, 1));
    }

    #[test]
    fn test_add_mixed_and_negative() {
        assert_eq!(add_to_date(d(2024, 1, 1), 1, 6, 0).unwrap(), d(2025, 7, 1));
        assert_eq!(add_to_date(d(2024, 3, 15), 0, -3, -15).unwrap(), d(2023, 11, 30));
    }

    #[test]
    fn test_add_extreme_offsets() {
        assert!(add_to_date(d(2024, 1, 1), 0, 0, i64::MAX).is_err());
        assert!(add_to_date(d(2024, 1, 1), 0, 0, i64::MIN).is_err());
        assert!(add_to_date(d(2024, 1, 1), i32::MAX, 0, 0).is_err());
        assert!(add_to_date(d(2024, 1, 1), 0, i32::MIN, 0).is_err());
        assert_eq!(add_to_date(d(2024, 1, 1), 0, 0, 366).unwrap(), d(2025, 1, 1));
    }

    #[test]
    fn test_format_long() {
        assert_eq!(format_long(d(2024, 1, 1)), "Monday, January 1, 2024");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date(" 2024-02-29 ").unwrap(), d(2024, 2, 29));
        assert!(parse_date("2023-02-29").is_err());
    }
}
