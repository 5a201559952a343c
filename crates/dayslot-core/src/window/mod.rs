//! Daily time windows and the category classifier.
//!
//! A day is split into four recurring windows (morning, daytime, evening,
//! night), each configured as a start/end time-of-day. A window whose start
//! is later than its end wraps past midnight. Windows may overlap; the
//! classifier resolves overlaps by fixed priority and falls back to
//! [`Category::Daytime`] when nothing matches.

pub mod day;
pub mod time_math;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

pub use day::{active_window, DayWindow};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// One of the four daily buckets an item can be placed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Morning,
    Daytime,
    Evening,
    Night,
}

impl Category {
    /// Classification priority order, also the order of the day.
    pub const ALL: [Category; 4] = [
        Category::Morning,
        Category::Daytime,
        Category::Evening,
        Category::Night,
    ];

    /// The category after this one, if any. Night is last.
    pub fn next(self) -> Option<Category> {
        match self {
            Category::Morning => Some(Category::Daytime),
            Category::Daytime => Some(Category::Evening),
            Category::Evening => Some(Category::Night),
            Category::Night => None,
        }
    }

    /// The category before this one, if any. Morning is first.
    pub fn previous(self) -> Option<Category> {
        match self {
            Category::Morning => None,
            Category::Daytime => Some(Category::Morning),
            Category::Evening => Some(Category::Daytime),
            Category::Night => Some(Category::Evening),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Morning => "morning",
            Category::Daytime => "daytime",
            Category::Evening => "evening",
            Category::Night => "night",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(Category::Morning),
            "daytime" | "day" => Ok(Category::Daytime),
            "evening" => Ok(Category::Evening),
            "night" => Ok(Category::Night),
            other => Err(ValidationError::InvalidValue {
                field: "category".into(),
                message: format!("unknown category '{other}'"),
            }),
        }
    }
}

/// A wall-clock time of day with minute precision, serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    /// Build from hour and minute.
    ///
    /// # Errors
    /// Returns an error unless `hour < 24` and `minute < 60`.
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour >= 24 || minute >= 60 {
            return Err(ValidationError::InvalidTimeOfDay(format!(
                "{hour:02}:{minute:02}"
            )));
        }
        Ok(Self {
            minutes: (hour * 60 + minute) as u16,
        })
    }

    /// Time-of-day of a timestamp, seconds truncated.
    pub fn of(timestamp: NaiveDateTime) -> Self {
        Self {
            minutes: (timestamp.hour() * 60 + timestamp.minute()) as u16,
        }
    }

    /// Minutes since midnight, `0..1440`.
    pub fn minutes_since_midnight(self) -> u16 {
        self.minutes
    }

    pub fn hour(self) -> u32 {
        u32::from(self.minutes / 60)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.minutes % 60)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeOfDay(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// A `[start, end)` time-of-day range. `start > end` wraps past midnight;
/// `start == end` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRange {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl CategoryRange {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Whether this range wraps past midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Membership test on minutes since midnight.
    pub fn contains(&self, t: TimeOfDay) -> bool {
        let (s, e, t) = (
            self.start.minutes_since_midnight(),
            self.end.minutes_since_midnight(),
            t.minutes_since_midnight(),
        );
        debug_assert!(t < MINUTES_PER_DAY);
        if s <= e {
            s <= t && t < e
        } else {
            t >= s || t < e
        }
    }
}

/// The four configured windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindowConfig {
    /// Where one day ends and the next begins. Morning start when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_boundary: Option<TimeOfDay>,
    #[serde(default = "default_morning")]
    pub morning: CategoryRange,
    #[serde(default = "default_daytime")]
    pub daytime: CategoryRange,
    #[serde(default = "default_evening")]
    pub evening: CategoryRange,
    #[serde(default = "default_night")]
    pub night: CategoryRange,
}

fn hm(hour: u32, minute: u32) -> TimeOfDay {
    TimeOfDay {
        minutes: (hour * 60 + minute) as u16,
    }
}

fn default_morning() -> CategoryRange {
    CategoryRange::new(hm(6, 0), hm(9, 0))
}
fn default_daytime() -> CategoryRange {
    CategoryRange::new(hm(9, 0), hm(18, 0))
}
fn default_evening() -> CategoryRange {
    CategoryRange::new(hm(18, 0), hm(22, 0))
}
fn default_night() -> CategoryRange {
    CategoryRange::new(hm(22, 0), hm(6, 0))
}

impl Default for TimeWindowConfig {
    fn default() -> Self {
        Self {
            morning: default_morning(),
            daytime: default_daytime(),
            evening: default_evening(),
            night: default_night(),
            day_boundary: None,
        }
    }
}

impl TimeWindowConfig {
    pub fn range(&self, category: Category) -> CategoryRange {
        match category {
            Category::Morning => self.morning,
            Category::Daytime => self.daytime,
            Category::Evening => self.evening,
            Category::Night => self.night,
        }
    }

    pub fn range_mut(&mut self, category: Category) -> &mut CategoryRange {
        match category {
            Category::Morning => &mut self.morning,
            Category::Daytime => &mut self.daytime,
            Category::Evening => &mut self.evening,
            Category::Night => &mut self.night,
        }
    }

    /// The rollover instant's time-of-day.
    pub fn rollover_time(&self) -> TimeOfDay {
        self.day_boundary.unwrap_or(self.morning.start)
    }

    /// Category of "now" for the presentation layer and the widget.
    pub fn current_category(&self, now: NaiveDateTime) -> Category {
        classify(now, self)
    }
}

/// Classify a timestamp into a category.
///
/// Categories are tried in [`Category::ALL`] order and the first whose
/// range contains the timestamp's time-of-day wins. Total: when no range
/// matches (gaps, or empty `start == end` ranges) the answer is
/// [`Category::Daytime`].
pub fn classify(timestamp: NaiveDateTime, config: &TimeWindowConfig) -> Category {
    let t = TimeOfDay::of(timestamp);
    Category::ALL
        .into_iter()
        .find(|category| config.range(*category).contains(t))
        .unwrap_or(Category::Daytime)
}
