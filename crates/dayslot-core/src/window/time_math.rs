//! Checked calendar arithmetic on local wall-clock values.
//!
//! Every helper returns a `Result`; callers decide explicitly what to do
//! when a date leaves chrono's supported range.

use chrono::{Days, NaiveDate, NaiveDateTime};

use super::TimeOfDay;
use crate::error::TimeMathError;

/// Place a time-of-day on a date.
pub fn at_time(date: NaiveDate, time: TimeOfDay) -> Result<NaiveDateTime, TimeMathError> {
    date.and_hms_opt(time.hour(), time.minute(), 0)
        .ok_or(TimeMathError::InvalidTime {
            date,
            hour: time.hour(),
            minute: time.minute(),
        })
}

/// Shift a date by a signed number of days.
pub fn shift_date(date: NaiveDate, days: i64) -> Result<NaiveDate, TimeMathError> {
    let out_of_range = TimeMathError::DateOutOfRange { date, days };
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude).ok_or(out_of_range)
    } else {
        date.checked_sub_days(magnitude).ok_or(out_of_range)
    }
}

/// Shift an instant by whole days, keeping its wall-clock time.
pub fn shift_days(instant: NaiveDateTime, days: i64) -> Result<NaiveDateTime, TimeMathError> {
    let date = shift_date(instant.date(), days)?;
    Ok(date.and_time(instant.time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_across_month_end() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(
            shift_date(date, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
        );
        assert_eq!(
            shift_date(date, -31).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }

    #[test]
    fn out_of_range_is_an_error_not_a_fallback() {
        let err = shift_date(NaiveDate::MAX, 1).unwrap_err();
        assert!(matches!(err, TimeMathError::DateOutOfRange { days: 1, .. }));
    }

    #[test]
    fn at_time_places_minutes() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let t = TimeOfDay::new(6, 30).unwrap();
        assert_eq!(
            at_time(date, t).unwrap(),
            date.and_hms_opt(6, 30, 0).unwrap()
        );
    }
}
