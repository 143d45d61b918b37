//! Calendar helpers for payroll periods

use chrono::{Datelike, NaiveDate, Weekday};

/// Count the days of a month that incur a daily benefit cost.
///
/// Holidays never count; Saturdays and Sundays count only when
/// `include_weekends` is set. An invalid year/month yields 0.
pub fn working_days(year: i32, month: u32, include_weekends: bool, holidays: &[NaiveDate]) -> u32 {
    let mut day = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(first) => first,
        None => return 0,
    };

    let mut count = 0;
    loop {
        let is_weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
        if !holidays.contains(&day) && (include_weekends || !is_weekend) {
            count += 1;
        }

        match day.succ_opt() {
            Some(next) if next.month() == month => day = next,
            _ => break,
        }
    }

    count
}

/// Month index used to compare periods across year boundaries
pub fn month_index(year: i32, month: u32) -> i64 {
    i64::from(year) * 12 + i64::from(month) - 1
}

/// The (year, month) immediately before the given one
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekdays_only() {
        // March 2024: 31 days, 10 weekend days
        assert_eq!(working_days(2024, 3, false, &[]), 21);
        // February 2024 (leap): 29 days, 8 weekend days
        assert_eq!(working_days(2024, 2, false, &[]), 21);
    }

    #[test]
    fn test_including_weekends() {
        assert_eq!(working_days(2024, 2, true, &[]), 29);
        assert_eq!(working_days(2023, 2, true, &[]), 28);
    }

    #[test]
    fn test_holidays_are_excluded() {
        let holidays = [
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),  // Wednesday
            NaiveDate::from_ymd_opt(2024, 5, 30).unwrap(), // Thursday
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),  // other month
        ];
        // May 2024: 23 weekdays
        assert_eq!(working_days(2024, 5, false, &holidays), 21);
        assert_eq!(working_days(2024, 5, true, &holidays), 29);
    }

    #[test]
    fn test_holiday_on_weekend_counts_once() {
        let holidays = [NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()]; // Saturday
        assert_eq!(working_days(2024, 6, false, &holidays), 20);
        assert_eq!(working_days(2024, 6, true, &holidays), 29);
    }

    #[test]
    fn test_invalid_month() {
        assert_eq!(working_days(2024, 13, true, &[]), 0);
        assert_eq!(working_days(2024, 0, false, &[]), 0);
    }

    #[test]
    fn test_previous_month_wraps() {
        assert_eq!(previous_month(2025, 1), (2024, 12));
        assert_eq!(previous_month(2025, 7), (2025, 6));
        assert_eq!(month_index(2025, 1) - month_index(2024, 12), 1);
    }
}
