//! The active day window: `[rollover instant, next rollover instant)`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::time_math::{at_time, shift_date, shift_days};
use super::{CategoryRange, TimeOfDay};
use crate::error::TimeMathError;

/// A half-open `[start, end)` span of local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DayWindow {
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }

    /// The same window widened by `days` on both sides.
    pub fn expanded(&self, days: i64) -> Result<DayWindow, TimeMathError> {
        Ok(DayWindow {
            start: shift_days(self.start, -days)?,
            end: shift_days(self.end, days)?,
        })
    }

    /// Where a category's range falls inside this window.
    ///
    /// The range starts at its first occurrence at or after the window
    /// start; a range that wraps past midnight ends on the following day.
    pub fn category_span(&self, range: CategoryRange) -> Result<DayWindow, TimeMathError> {
        let mut start = at_time(self.start.date(), range.start)?;
        if start < self.start {
            start = shift_days(start, 1)?;
        }
        let mut end = at_time(start.date(), range.end)?;
        if range.crosses_midnight() {
            end = shift_days(end, 1)?;
        }
        Ok(DayWindow { start, end })
    }

    /// The window immediately after this one.
    pub fn following(&self) -> Result<DayWindow, TimeMathError> {
        Ok(DayWindow {
            start: self.end,
            end: shift_days(self.end, 1)?,
        })
    }
}

/// Compute the day window that contains `now`.
///
/// Before today's rollover instant the previous day is still active.
pub fn active_window(now: NaiveDateTime, boundary: TimeOfDay) -> Result<DayWindow, TimeMathError> {
    let today = now.date();
    let todays_rollover = at_time(today, boundary)?;

    if now < todays_rollover {
        let yesterday = shift_date(today, -1)?;
        Ok(DayWindow {
            start: at_time(yesterday, boundary)?,
            end: todays_rollover,
        })
    } else {
        let tomorrow = shift_date(today, 1)?;
        Ok(DayWindow {
            start: todays_rollover,
            end: at_time(tomorrow, boundary)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn six() -> TimeOfDay {
        TimeOfDay::new(6, 0).unwrap()
    }

    #[test]
    fn after_boundary_window_starts_today() {
        let w = active_window(dt(17, 7, 0), six()).unwrap();
        assert_eq!(w.start, dt(17, 6, 0));
        assert_eq!(w.end, dt(18, 6, 0));
    }

    #[test]
    fn before_boundary_window_is_yesterdays() {
        let w = active_window(dt(17, 2, 30), six()).unwrap();
        assert_eq!(w.start, dt(16, 6, 0));
        assert_eq!(w.end, dt(17, 6, 0));
    }

    #[test]
    fn exactly_at_boundary_belongs_to_new_day() {
        let w = active_window(dt(17, 6, 0), six()).unwrap();
        assert_eq!(w.start, dt(17, 6, 0));
        assert!(w.contains(dt(17, 6, 0)));
        assert!(!w.contains(dt(18, 6, 0)));
    }

    #[test]
    fn midnight_boundary_is_calendar_day() {
        let w = active_window(dt(17, 0, 0), TimeOfDay::new(0, 0).unwrap()).unwrap();
        assert_eq!(w.start, dt(17, 0, 0));
        assert_eq!(w.end, dt(18, 0, 0));
    }

    #[test]
    fn category_spans_within_window() {
        let w = active_window(dt(17, 7, 0), six()).unwrap();
        let evening = CategoryRange::new(TimeOfDay::new(18, 0).unwrap(), TimeOfDay::new(22, 0).unwrap());
        let span = w.category_span(evening).unwrap();
        assert_eq!((span.start, span.end), (dt(17, 18, 0), dt(17, 22, 0)));

        let night = CategoryRange::new(TimeOfDay::new(22, 0).unwrap(), six());
        let span = w.category_span(night).unwrap();
        assert_eq!((span.start, span.end), (dt(17, 22, 0), dt(18, 6, 0)));

        // a range before the boundary belongs to the early hours of the next day
        let early = CategoryRange::new(TimeOfDay::new(1, 0).unwrap(), TimeOfDay::new(3, 0).unwrap());
        let span = w.category_span(early).unwrap();
        assert_eq!((span.start, span.end), (dt(18, 1, 0), dt(18, 3, 0)));
    }

    #[test]
    fn expanded_and_following() {
        let w = active_window(dt(17, 7, 0), six()).unwrap();
        let wide = w.expanded(2).unwrap();
        assert_eq!(wide.start, dt(15, 6, 0));
        assert_eq!(wide.end, dt(20, 6, 0));
        let next = w.following().unwrap();
        assert_eq!(next.start, dt(18, 6, 0));
        assert_eq!(next.end, dt(19, 6, 0));
    }
}
